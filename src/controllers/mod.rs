pub mod bookings;
pub mod showtimes;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::error::BookingError;
use crate::models::SeatRef;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(showtimes::routes())
        .merge(bookings::routes())
}

/// Maps a booking failure onto the HTTP surface. Storage failures are logged
/// here and reported without internals.
pub(crate) fn booking_error(err: BookingError) -> ApiError {
    match err {
        BookingError::NotAuthenticated => api_error(StatusCode::UNAUTHORIZED, err.to_string()),
        BookingError::Validation(_) => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        BookingError::SeatConflict { .. } => api_error(StatusCode::CONFLICT, err.to_string()),
        BookingError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, err.to_string()),
        BookingError::InvalidStateTransition { .. } => api_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        BookingError::Storage(e) => {
            error!("Storage failure: {}", e);
            api_error(StatusCode::SERVICE_UNAVAILABLE, "Storage is unavailable, try again")
        }
    }
}

/// Accepts either a hall label (`C5`) or a full seat id (`{showtime}_C_5`).
pub(crate) fn parse_seats(showtime_id: &str, raw: &[String]) -> Result<Vec<SeatRef>, ApiError> {
    raw.iter()
        .map(|seat| {
            let parsed = if seat.contains('_') {
                seat.parse::<SeatRef>()
            } else {
                SeatRef::from_label(showtime_id, seat)
            };
            parsed.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
        })
        .collect()
}
