use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;

use syncline_drivers::DriverError;

use crate::destinations::DestinationError;

/// Errors returned by the HTTP handlers.
///
/// Every variant answers 400: a failed test is a verdict on the submitted
/// config, not a fault of the service.
#[derive(Debug)]
pub enum ServiceError {
    BadRequest(String),
    ValidationError(String),
    UnsupportedType(String),
    ConnectionTestFailed(String),
}

impl ServiceError {
    fn kind(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "Bad Request",
            ServiceError::ValidationError(_) => "Validation Error",
            ServiceError::UnsupportedType(_) => "Unsupported Type",
            ServiceError::ConnectionTestFailed(_) => "Connection Test Failed",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::BadRequest(msg)
            | ServiceError::ValidationError(msg)
            | ServiceError::UnsupportedType(msg)
            | ServiceError::ConnectionTestFailed(msg) => msg,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": self.kind(),
            "message": self.message()
        }))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> Self {
        ServiceError::BadRequest(format!("Failed to parse body: {}", error))
    }
}

impl From<DestinationError> for ServiceError {
    fn from(error: DestinationError) -> Self {
        match error {
            DestinationError::InvalidConfig(e) => ServiceError::ValidationError(e.to_string()),
            DestinationError::UnsupportedType(_) => {
                ServiceError::UnsupportedType(error.to_string())
            }
            other => ServiceError::ConnectionTestFailed(other.to_string()),
        }
    }
}

impl From<DriverError> for ServiceError {
    fn from(error: DriverError) -> Self {
        match error {
            DriverError::InvalidConfig(e) => ServiceError::ValidationError(e.to_string()),
            DriverError::UnknownSourceType(_) | DriverError::TestConnectionUnsupported(_) => {
                ServiceError::UnsupportedType(error.to_string())
            }
            other => ServiceError::ConnectionTestFailed(other.to_string()),
        }
    }
}
