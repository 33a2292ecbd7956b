//! Error types for the alert service.

use thiserror::Error;

use crate::processor::expiry::DateRejection;

#[derive(Error, Debug)]
pub enum Error {
    /// Expiry value failed normalization. Never fatal for a pass.
    #[error("invalid expiry date '{value}': {reason}")]
    InvalidDate { value: String, reason: DateRejection },

    /// The database could not be reached (I/O, TLS, pool exhausted or closed).
    #[error("alert store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    /// Any other database failure, scoped to the row being processed.
    #[error("alert store query failed: {0}")]
    Store(#[source] sqlx::Error),

    #[error("alert {0} not found or already acknowledged")]
    AlertNotFound(i64),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("invalid schedule '{expr}': {message}")]
    Schedule { expr: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::StoreUnavailable(err),
            other => Self::Store(other),
        }
    }
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Store-level failures abort a whole pass; everything else is skipped per row.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_errors_are_store_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_store_unavailable());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = sqlx::Error::Io(io).into();
        assert!(err.is_store_unavailable());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_row_errors_are_not_store_unavailable() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Store(_)));
        assert!(!err.is_store_unavailable());
    }

    #[test]
    fn test_invalid_date_display() {
        let err = Error::InvalidDate {
            value: "99/99/9999".to_string(),
            reason: DateRejection::Unparsable,
        };
        assert_eq!(
            err.to_string(),
            "invalid expiry date '99/99/9999': unparsable"
        );
    }

    #[test]
    fn test_alert_not_found_display() {
        assert_eq!(
            Error::AlertNotFound(12).to_string(),
            "alert 12 not found or already acknowledged"
        );
    }
}
