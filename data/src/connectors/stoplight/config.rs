use serde::{Deserialize, Serialize};
use syncline_drivers::validation::{require, validate_required, Validate, ValidationError};
use syncline_drivers::CollectionConfig;

pub const DEFAULT_BASE_URL: &str = "https://services.leadconnectorhq.com";

/// Connector config decoded from `SourceConfig::config`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoplightConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub api_version: String,
    /// Calendar fetched by the connectivity probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    /// Overrides the API host, e.g. for a sandbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendars: Option<CollectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<CollectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunities: Option<CollectionConfig>,
}

impl StoplightConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Token and API version only; all a connection test needs.
    pub fn validate_credentials(&self) -> Result<(), ValidationError> {
        require(&self.access_token, "Stoplight access_token is required")?;
        require(&self.api_version, "Stoplight api_version is required")
    }
}

impl Validate for StoplightConfig {
    const NAME: &'static str = "Stoplight";

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_credentials()?;

        if self.calendars.is_none() {
            return Err(ValidationError::new("Stoplight calendars collection is required"));
        }
        if self.contacts.is_none() {
            return Err(ValidationError::new("Stoplight contacts collection is required"));
        }
        if self.opportunities.is_none() {
            return Err(ValidationError::new("Stoplight opportunities collection is required"));
        }

        validate_required(self.calendars.as_ref())?;
        validate_required(self.contacts.as_ref())?;
        validate_required(self.opportunities.as_ref())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StoplightConfig {
        StoplightConfig {
            access_token: "token".to_string(),
            api_version: "2021-07-28".to_string(),
            calendars: Some(CollectionConfig::new("calendars")),
            contacts: Some(CollectionConfig::new("contacts")),
            opportunities: Some(CollectionConfig::new("opportunities")),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_absent_config() {
        let err = validate_required::<StoplightConfig>(None).unwrap_err();
        assert_eq!(err.to_string(), "Stoplight config is required");
    }

    #[test]
    fn test_required_fields_checked_in_order() {
        let mut config = valid();
        config.access_token.clear();
        config.api_version.clear();
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Stoplight access_token is required"
        );

        let mut config = valid();
        config.api_version.clear();
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Stoplight api_version is required"
        );

        let mut config = valid();
        config.contacts = None;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Stoplight contacts collection is required"
        );
    }

    #[test]
    fn test_credentials_ignore_collections() {
        let config = StoplightConfig {
            access_token: "token".to_string(),
            api_version: "2021-07-28".to_string(),
            ..Default::default()
        };
        assert!(config.validate_credentials().is_ok());
        assert!(config.validate().is_err());

        let config = StoplightConfig {
            api_version: "2021-07-28".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate_credentials().unwrap_err().to_string(),
            "Stoplight access_token is required"
        );
    }

    #[test]
    fn test_nested_error_propagates_verbatim() {
        let mut config = valid();
        config.opportunities = Some(CollectionConfig::new(""));
        assert_eq!(config.validate().unwrap_err().to_string(), "collection name is required");
    }

    #[test]
    fn test_base_url_default_and_override() {
        let mut config = valid();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);

        config.base_url = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }
}
