use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural problem found in a config before any network call is made.
///
/// The message is shown to the caller verbatim, so it should name the
/// offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Required-field checks. Implementations must be pure: no I/O, no mutation.
pub trait Validate {
    /// Human name used in the "config is required" error
    const NAME: &'static str;

    fn validate(&self) -> Result<(), ValidationError>;
}

/// Validates an optional config, failing fast when it is absent.
pub fn validate_required<T: Validate>(config: Option<&T>) -> Result<(), ValidationError> {
    match config {
        Some(config) => config.validate(),
        None => Err(ValidationError(format!("{} config is required", T::NAME))),
    }
}

/// Fails with `message` when `value` is blank.
pub fn require(value: &str, message: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Webhook {
        token: String,
    }

    impl Validate for Webhook {
        const NAME: &'static str = "Webhook";

        fn validate(&self) -> Result<(), ValidationError> {
            require(&self.token, "Webhook token is required")
        }
    }

    #[test]
    fn test_absent_config_is_distinct_error() {
        let err = validate_required::<Webhook>(None).unwrap_err();
        assert_eq!(err.message(), "Webhook config is required");
    }

    #[test]
    fn test_present_config_is_validated() {
        let webhook = Webhook { token: "  ".to_string() };
        let err = validate_required(Some(&webhook)).unwrap_err();
        assert_eq!(err.to_string(), "Webhook token is required");

        let webhook = Webhook { token: "abc".to_string() };
        assert!(validate_required(Some(&webhook)).is_ok());
    }
}
