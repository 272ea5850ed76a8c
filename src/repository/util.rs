//! Repository utilities.

use diesel::result::DatabaseErrorInformation;

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// A status column held a value outside the closed set for its table.
#[derive(Debug, thiserror::Error)]
#[error("invalid {table} status in store: {value:?}")]
pub struct InvalidStatus {
    pub table: &'static str,
    pub value: String,
}

/// Reject an unknown status string read from the store.
pub fn invalid_status(table: &'static str, value: &str) -> diesel::result::Error {
    diesel::result::Error::DeserializationError(Box::new(InvalidStatus {
        table,
        value: value.to_string(),
    }))
}

/// Whether an error came from [`invalid_status`].
pub fn is_invalid_status(err: &diesel::result::Error) -> bool {
    match err {
        diesel::result::Error::DeserializationError(inner) => inner.is::<InvalidStatus>(),
        _ => false,
    }
}
