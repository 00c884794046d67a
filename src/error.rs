use crate::models::BookingStatus;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("no signed-in user")]
    NotAuthenticated,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Seats were taken by another booking; the seat map must be refreshed
    /// before the user picks again.
    #[error("seats already taken: {}", .seats.join(", "))]
    SeatConflict { seats: Vec<String> },

    #[error("booking cannot move from {from} to {to}")]
    InvalidStateTransition { from: BookingStatus, to: BookingStatus },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        BookingError::Validation(errors.to_string())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
