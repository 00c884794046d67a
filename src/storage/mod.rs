//! Document storage contract.
//!
//! The booking core talks to persistence only through [`Storage`]: point reads,
//! filtered queries and one all-or-nothing batch write. Every mutation of
//! shared booking state goes through [`Storage::atomic_write`]; a backend must
//! either apply the whole batch or nothing, and must reject a batch whose
//! guards or uniqueness constraints no longer hold at commit time.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// Collection names used by the booking service.
pub mod collections {
    pub const MOVIES: &str = "movies";
    pub const SHOWTIMES: &str = "showtimes";
    pub const BOOKINGS: &str = "bookings";
    pub const SEAT_CLAIMS: &str = "seat_claims";
    pub const USERS: &str = "users";
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// A guard or uniqueness constraint rejected the batch.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("invalid write: {0}")]
    InvalidWrite(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A JSON document keyed by an opaque id within its collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self { id: id.into(), body }
    }

    pub fn from_model<T: Serialize>(id: impl Into<String>, model: &T) -> StorageResult<Self> {
        Ok(Self::new(id, serde_json::to_value(model)?))
    }

    pub fn decode<T: DeserializeOwned>(self) -> StorageResult<T> {
        Ok(serde_json::from_value(self.body)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    /// Field value is one of the values in the filter's array.
    In,
}

/// Top-level field predicate for [`Storage::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), op: FilterOp::Eq, value: value.into() }
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn matches(&self, body: &Value) -> bool {
        let actual = body.get(&self.field);
        match self.op {
            FilterOp::Eq => actual == Some(&self.value),
            FilterOp::In => match (&self.value, actual) {
                (Value::Array(candidates), Some(actual)) => candidates.contains(actual),
                _ => false,
            },
        }
    }
}

/// Condition an existing document must satisfy at commit time.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    Equals { field: String, value: Value },
    /// Integer field is greater than or equal to `min`.
    AtLeast { field: String, min: i64 },
}

impl Guard {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Guard::Equals { field: field.into(), value: value.into() }
    }

    pub fn at_least(field: impl Into<String>, min: i64) -> Self {
        Guard::AtLeast { field: field.into(), min }
    }

    pub fn holds(&self, body: &Value) -> bool {
        match self {
            Guard::Equals { field, value } => body.get(field) == Some(value),
            Guard::AtLeast { field, min } => body
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|actual| actual >= *min),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Equals { field, value } => write!(f, "{} == {}", field, value),
            Guard::AtLeast { field, min } => write!(f, "{} >= {}", field, min),
        }
    }
}

/// Field mutation applied by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set { field: String, value: Value },
    /// Adds `by` to an integer field; applied against the committed value,
    /// never a value the caller read earlier.
    Increment { field: String, by: i64 },
}

impl Change {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Change::Set { field: field.into(), value: value.into() }
    }

    pub fn increment(field: impl Into<String>, by: i64) -> Self {
        Change::Increment { field: field.into(), by }
    }

    fn apply(&self, body: &mut Value) -> StorageResult<()> {
        let object = body
            .as_object_mut()
            .ok_or_else(|| StorageError::InvalidWrite("document body is not an object".to_string()))?;

        match self {
            Change::Set { field, value } => {
                object.insert(field.clone(), value.clone());
            }
            Change::Increment { field, by } => {
                let current = object
                    .get(field)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| StorageError::InvalidWrite(format!("field {} is not an integer", field)))?;
                let next = current
                    .checked_add(*by)
                    .ok_or_else(|| StorageError::InvalidWrite(format!("field {} overflowed", field)))?;
                object.insert(field.clone(), Value::from(next));
            }
        }
        Ok(())
    }
}

/// One operation of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Fails the batch with a conflict if the id already exists.
    Insert { collection: String, document: Document },
    /// Fails with `NotFound` if missing, with a conflict if a guard fails.
    Update { collection: String, id: String, guards: Vec<Guard>, changes: Vec<Change> },
    /// A missing document is a no-op; a present one must satisfy the guards.
    Delete { collection: String, id: String, guards: Vec<Guard> },
}

impl WriteOp {
    pub fn insert(collection: &str, document: Document) -> Self {
        WriteOp::Insert { collection: collection.to_string(), document }
    }

    pub fn update(collection: &str, id: impl Into<String>, guards: Vec<Guard>, changes: Vec<Change>) -> Self {
        WriteOp::Update { collection: collection.to_string(), id: id.into(), guards, changes }
    }

    pub fn delete(collection: &str, id: impl Into<String>, guards: Vec<Guard>) -> Self {
        WriteOp::Delete { collection: collection.to_string(), id: id.into(), guards }
    }
}

/// Checks every guard against `body`.
pub(crate) fn check_guards(collection: &str, id: &str, guards: &[Guard], body: &Value) -> StorageResult<()> {
    match guards.iter().find(|guard| !guard.holds(body)) {
        Some(failed) => Err(StorageError::Conflict(format!(
            "guard `{}` failed on {}/{}",
            failed, collection, id
        ))),
        None => Ok(()),
    }
}

/// Checks guards, then applies changes in order to `body`.
pub(crate) fn apply_update(
    collection: &str,
    id: &str,
    guards: &[Guard],
    changes: &[Change],
    body: &mut Value,
) -> StorageResult<()> {
    check_guards(collection, id, guards, body)?;
    for change in changes {
        change.apply(body)?;
    }
    Ok(())
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>>;

    /// Returns every document matching all filters, ordered by id.
    async fn query(&self, collection: &str, filters: &[Filter]) -> StorageResult<Vec<Document>>;

    /// Applies the batch all-or-nothing.
    async fn atomic_write(&self, ops: Vec<WriteOp>) -> StorageResult<()>;
}
