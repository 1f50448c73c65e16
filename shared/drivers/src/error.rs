use std::time::Duration;
use thiserror::Error;

use crate::context::Interrupted;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    InvalidConfig(#[from] ValidationError),

    #[error("{source_type} returned status code {status}")]
    UnexpectedStatus { source_type: String, status: u16 },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("{0} returned empty response")]
    EmptyResponse(String),

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("driver already registered for source type: {0}")]
    AlreadyRegistered(String),

    #[error("test connection is not supported for source type: {0}")]
    TestConnectionUnsupported(String),

    /// Raised by `ObjectsLoader` implementations when the sink rejects a batch
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

impl DriverError {
    /// HTTP status carried by the error, if the upstream answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DriverError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<Interrupted> for DriverError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => DriverError::Cancelled,
            Interrupted::TimedOut(after) => DriverError::TimedOut(after),
        }
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DriverError::Decode(err.to_string())
        } else {
            DriverError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Decode(err.to_string())
    }
}
