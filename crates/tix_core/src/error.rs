use serde::{Deserialize, Serialize};
use std::fmt;

pub const TICKET_NOT_FOUND: &str = "TICKET_NOT_FOUND";

/// Single structured error shape used across the core, the notifier and the CLI boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn ticket_not_found(ticket_id: &str) -> Self {
        Self::new(TICKET_NOT_FOUND, "Ticket not found").with_details(format!("ticket_id={ticket_id}"))
    }

    pub fn is_not_found(&self) -> bool {
        self.code == TICKET_NOT_FOUND
    }

    /// Map a rusqlite error into a store failure.
    ///
    /// Lock contention (`SQLITE_BUSY`/`SQLITE_LOCKED`) past the busy timeout and unique-key
    /// conflicts are retryable; everything else is not.
    pub fn from_db(code: &str, message: impl Into<String>, err: rusqlite::Error) -> Self {
        let (code, retryable) = match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    ("DB_BUSY", true)
                }
                rusqlite::ErrorCode::ConstraintViolation => ("DB_CONFLICT", true),
                _ => (code, false),
            },
            _ => (code, false),
        };
        Self::new(code, message)
            .with_details(err.to_string())
            .with_retryable(retryable)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
