use std::fmt;
use std::time::Duration;
use thiserror::Error;

use syncline_drivers::{Interrupted, ValidationError};

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error(transparent)]
    InvalidConfig(#[from] ValidationError),

    #[error("unsupported destination type {0}")]
    UnsupportedType(String),

    #[error("Error parsing ClickHouse DSN {dsn}: {reason}")]
    InvalidEndpoint { dsn: String, reason: String },

    #[error("{backend} connection failed: {message}")]
    Connection { backend: &'static str, message: String },

    #[error("{backend} write permission check failed: {message}")]
    WritePermission { backend: &'static str, message: String },

    #[error("{backend} returned status code {status}: {message}")]
    UnexpectedStatus {
        backend: &'static str,
        status: u16,
        message: String,
    },

    #[error("connection test cancelled")]
    Cancelled,

    #[error("connection test timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl DestinationError {
    pub fn connection(backend: &'static str, err: impl fmt::Display) -> Self {
        DestinationError::Connection {
            backend,
            message: err.to_string(),
        }
    }

    pub fn write_permission(backend: &'static str, err: impl fmt::Display) -> Self {
        DestinationError::WritePermission {
            backend,
            message: err.to_string(),
        }
    }

    /// `true` when the failure came from the config itself, not a backend
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DestinationError::InvalidConfig(_) | DestinationError::UnsupportedType(_)
        )
    }
}

impl From<Interrupted> for DestinationError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => DestinationError::Cancelled,
            Interrupted::TimedOut(after) => DestinationError::TimedOut(after),
        }
    }
}

/// One failure per independently probed endpoint.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<DestinationError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: DestinationError) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DestinationError> {
        self.errors.iter()
    }

    /// `Ok` when nothing failed
    pub fn into_result(self) -> Result<(), DestinationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DestinationError::Aggregate(self))
        }
    }
}

impl Extend<DestinationError> for AggregateError {
    fn extend<I: IntoIterator<Item = DestinationError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            writeln!(f, "1 error occurred:")?;
        } else {
            writeln!(f, "{} errors occurred:", self.errors.len())?;
        }
        for err in &self.errors {
            writeln!(f, "\t* {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aggregate_is_ok() {
        assert!(AggregateError::new().into_result().is_ok());
    }

    #[test]
    fn test_aggregate_display_lists_every_error() {
        let mut agg = AggregateError::new();
        agg.push(DestinationError::connection("clickhouse", "refused"));
        agg.push(DestinationError::InvalidEndpoint {
            dsn: "http://[::1".to_string(),
            reason: "invalid IPv6 address".to_string(),
        });

        let text = agg.to_string();
        assert!(text.starts_with("2 errors occurred:"));
        assert!(text.contains("* clickhouse connection failed: refused"));
        assert!(text.contains("* Error parsing ClickHouse DSN http://[::1"));

        let err = agg.into_result().unwrap_err();
        assert!(matches!(err, DestinationError::Aggregate(ref a) if a.len() == 2));
    }

    #[test]
    fn test_interrupted_conversion() {
        assert!(matches!(
            DestinationError::from(Interrupted::Cancelled),
            DestinationError::Cancelled
        ));
        assert!(!DestinationError::connection("snowflake", "refused").is_config_error());
        assert!(DestinationError::UnsupportedType("x".into()).is_config_error());
    }
}
