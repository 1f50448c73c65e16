use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

use syncline_drivers::validation::{require, validate_required, Validate, ValidationError};

use super::error::DestinationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Batch,
    Stream,
}

/// `null` and `""` read as no mode at all.
fn deserialize_mode<'de, D>(deserializer: D) -> Result<Option<Mode>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("batch") => Ok(Some(Mode::Batch)),
        Some("stream") => Ok(Some(Mode::Stream)),
        Some(other) => Err(serde::de::Error::unknown_variant(other, &["batch", "stream"])),
    }
}

/// Backend tags accepted in `DestinationConfig::type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationType {
    Postgres,
    ClickHouse,
    Redshift,
    BigQuery,
    Snowflake,
    GoogleAnalytics,
    Facebook,
    WebHook,
}

impl DestinationType {
    pub const ALL: [DestinationType; 8] = [
        DestinationType::Postgres,
        DestinationType::ClickHouse,
        DestinationType::Redshift,
        DestinationType::BigQuery,
        DestinationType::Snowflake,
        DestinationType::GoogleAnalytics,
        DestinationType::Facebook,
        DestinationType::WebHook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Postgres => "postgres",
            DestinationType::ClickHouse => "clickhouse",
            DestinationType::Redshift => "redshift",
            DestinationType::BigQuery => "bigquery",
            DestinationType::Snowflake => "snowflake",
            DestinationType::GoogleAnalytics => "google_analytics",
            DestinationType::Facebook => "facebook",
            DestinationType::WebHook => "webhook",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = DestinationError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        DestinationType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| DestinationError::UnsupportedType(tag.to_string()))
    }
}

/// Connection settings shared by Postgres and Redshift
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub db: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

impl Validate for DataSourceConfig {
    const NAME: &'static str = "Datasource";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.host, "Datasource host is required parameter")?;
        require(&self.db, "Datasource db is required parameter")?;
        require(&self.username, "Datasource username is required parameter")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default)]
    pub dsns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default)]
    pub db: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tls: HashMap<String, String>,
}

impl Validate for ClickHouseConfig {
    const NAME: &'static str = "ClickHouse";

    fn validate(&self) -> Result<(), ValidationError> {
        if self.dsns.is_empty() {
            return Err(ValidationError::new("dsn is required parameter"));
        }

        for dsn in &self.dsns {
            let dsn = dsn.trim();
            if dsn.is_empty() {
                return Err(ValidationError::new("DSNs values can't be empty"));
            }
            if !dsn.starts_with("http://") && !dsn.starts_with("https://") {
                return Err(ValidationError::new("DSNs must have http:// or https:// prefix"));
            }
        }

        let has_cluster = self.cluster.as_deref().map_or(false, |c| !c.trim().is_empty());
        if self.dsns.len() > 1 && !has_cluster {
            return Err(ValidationError::new("cluster is required parameter when dsns count > 1"));
        }

        require(&self.db, "db is required parameter")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    /// Custom endpoint for S3-compatible stores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl Validate for S3Config {
    const NAME: &'static str = "S3";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.access_key_id, "S3 access_key_id is required parameter")?;
        require(&self.secret_access_key, "S3 secret_access_key is required parameter")?;
        require(&self.bucket, "S3 bucket is required parameter")?;
        require(&self.region, "S3 region is required parameter")?;
        Ok(())
    }
}

/// Google Cloud settings for BigQuery and GCS staging.
///
/// `key_file` is either the service account JSON object or its path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<Value>,
    #[serde(default, rename = "gcs_bucket")]
    pub bucket: String,
    #[serde(default, rename = "bq_project")]
    pub project: String,
    #[serde(default, rename = "bq_dataset")]
    pub dataset: String,
}

impl GoogleConfig {
    /// Checks credentials, plus the staging bucket unless `stream_mode`.
    pub fn validate_mode(&self, stream_mode: bool) -> Result<(), ValidationError> {
        let has_key = match &self.key_file {
            None | Some(Value::Null) => false,
            Some(Value::String(path)) => !path.trim().is_empty(),
            Some(Value::Object(key)) => !key.is_empty(),
            Some(_) => false,
        };
        if !has_key {
            return Err(ValidationError::new("Google key_file is required parameter"));
        }

        if !stream_mode {
            require(
                &self.bucket,
                "Google cloud storage bucket(gcs_bucket) is required parameter",
            )?;
        }
        Ok(())
    }

    pub fn validate_bigquery(&self, stream_mode: bool) -> Result<(), ValidationError> {
        self.validate_mode(stream_mode)?;
        require(&self.project, "BigQuery project(bq_project) is required parameter")
    }
}

impl Validate for GoogleConfig {
    const NAME: &'static str = "Google";

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_mode(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    #[serde(default)]
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub db: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub warehouse: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

impl Validate for SnowflakeConfig {
    const NAME: &'static str = "Snowflake";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.account, "Snowflake account is required parameter")?;
        require(&self.db, "Snowflake db is required parameter")?;
        require(&self.username, "Snowflake username is required parameter")?;
        require(&self.warehouse, "Snowflake warehouse is required parameter")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleAnalyticsConfig {
    #[serde(default)]
    pub tracking_id: String,
}

impl Validate for GoogleAnalyticsConfig {
    const NAME: &'static str = "Google Analytics";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.tracking_id, "tracking_id is required parameter")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacebookConversionConfig {
    #[serde(default)]
    pub pixel_id: String,
    #[serde(default)]
    pub access_token: String,
}

impl Validate for FacebookConversionConfig {
    const NAME: &'static str = "Facebook";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.pixel_id, "pixel_id is required parameter")?;
        require(&self.access_token, "access_token is required parameter")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebHookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl Validate for WebHookConfig {
    const NAME: &'static str = "WebHook";

    fn validate(&self) -> Result<(), ValidationError> {
        require(&self.url, "'url' is required parameter")?;

        match Url::parse(self.url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
            _ => Err(ValidationError::new("'url' must be an absolute http(s) URL")),
        }
    }
}

/// Destination payload as received on the wire.
///
/// Only the sub-config matching `type` is read; the others are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(rename = "type", default)]
    pub destination_type: String,
    #[serde(
        default,
        deserialize_with = "deserialize_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DataSourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_analytics: Option<GoogleAnalyticsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clickhouse: Option<ClickHouseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowflake: Option<SnowflakeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<FacebookConversionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebHookConfig>,
}

/// Object store used by a batch-mode warehouse loader
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StagingStorage<'a> {
    S3(&'a S3Config),
    Gcs(&'a GoogleConfig),
}

impl StagingStorage<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            StagingStorage::S3(_) => "s3",
            StagingStorage::Gcs(_) => "gcs",
        }
    }
}

/// A validated destination, one variant per backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Destination<'a> {
    Postgres(&'a DataSourceConfig),
    ClickHouse(&'a ClickHouseConfig),
    Redshift {
        datasource: &'a DataSourceConfig,
        staging: Option<StagingStorage<'a>>,
    },
    BigQuery {
        google: &'a GoogleConfig,
        staging: Option<StagingStorage<'a>>,
    },
    Snowflake {
        snowflake: &'a SnowflakeConfig,
        staging: Option<StagingStorage<'a>>,
    },
    GoogleAnalytics(&'a GoogleAnalyticsConfig),
    Facebook(&'a FacebookConversionConfig),
    WebHook(&'a WebHookConfig),
}

impl Destination<'_> {
    pub fn destination_type(&self) -> DestinationType {
        match self {
            Destination::Postgres(_) => DestinationType::Postgres,
            Destination::ClickHouse(_) => DestinationType::ClickHouse,
            Destination::Redshift { .. } => DestinationType::Redshift,
            Destination::BigQuery { .. } => DestinationType::BigQuery,
            Destination::Snowflake { .. } => DestinationType::Snowflake,
            Destination::GoogleAnalytics(_) => DestinationType::GoogleAnalytics,
            Destination::Facebook(_) => DestinationType::Facebook,
            Destination::WebHook(_) => DestinationType::WebHook,
        }
    }
}

fn required<T: Validate>(config: Option<&T>) -> Result<&T, ValidationError> {
    validate_required(config)?;
    config.ok_or_else(|| ValidationError(format!("{} config is required", T::NAME)))
}

impl DestinationConfig {
    pub fn new(destination_type: impl Into<String>) -> Self {
        Self {
            destination_type: destination_type.into(),
            ..Default::default()
        }
    }

    /// Staging checks run only for an explicit `batch`.
    pub fn is_batch(&self) -> bool {
        self.mode == Some(Mode::Batch)
    }

    /// Parses the tag and validates the matching sub-configs. No I/O.
    pub fn resolve(&self) -> Result<Destination<'_>, DestinationError> {
        let batch = self.is_batch();

        let destination = match self.destination_type.parse::<DestinationType>()? {
            DestinationType::Postgres => {
                Destination::Postgres(required(self.datasource.as_ref())?)
            }
            DestinationType::ClickHouse => {
                Destination::ClickHouse(required(self.clickhouse.as_ref())?)
            }
            DestinationType::Redshift => {
                let datasource = required(self.datasource.as_ref())?;
                let staging = if batch {
                    Some(StagingStorage::S3(required(self.s3.as_ref())?))
                } else {
                    None
                };
                Destination::Redshift { datasource, staging }
            }
            DestinationType::BigQuery => {
                let google = self
                    .google
                    .as_ref()
                    .ok_or_else(|| ValidationError::new("Google config is required"))?;
                google.validate_bigquery(!batch)?;
                let staging = batch.then_some(StagingStorage::Gcs(google));
                Destination::BigQuery { google, staging }
            }
            DestinationType::Snowflake => {
                let snowflake = required(self.snowflake.as_ref())?;
                let staging = if batch { self.snowflake_staging()? } else { None };
                Destination::Snowflake { snowflake, staging }
            }
            DestinationType::GoogleAnalytics => {
                Destination::GoogleAnalytics(required(self.google_analytics.as_ref())?)
            }
            DestinationType::Facebook => {
                Destination::Facebook(required(self.facebook.as_ref())?)
            }
            DestinationType::WebHook => Destination::WebHook(required(self.webhook.as_ref())?),
        };

        Ok(destination)
    }

    /// S3 wins over GCS; a batch Snowflake without either bucket loads directly.
    fn snowflake_staging(&self) -> Result<Option<StagingStorage<'_>>, ValidationError> {
        if let Some(s3) = self.s3.as_ref().filter(|s3| !s3.bucket.trim().is_empty()) {
            s3.validate()?;
            return Ok(Some(StagingStorage::S3(s3)));
        }
        if let Some(google) = self.google.as_ref().filter(|g| !g.bucket.trim().is_empty()) {
            google.validate_mode(false)?;
            return Ok(Some(StagingStorage::Gcs(google)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> DestinationConfig {
        serde_json::from_value(value).unwrap()
    }

    fn resolve_err(value: Value) -> String {
        parse(value).resolve().unwrap_err().to_string()
    }

    #[test]
    fn test_mode_is_batch_only_when_explicit() {
        let config = parse(json!({"type": "postgres"}));
        assert_eq!(config.mode, None);
        assert!(!config.is_batch());

        assert_eq!(parse(json!({"type": "x", "mode": ""})).mode, None);
        assert_eq!(parse(json!({"type": "x", "mode": null})).mode, None);
        assert_eq!(parse(json!({"type": "x", "mode": "stream"})).mode, Some(Mode::Stream));
        assert!(parse(json!({"type": "x", "mode": "batch"})).is_batch());
        assert!(serde_json::from_value::<DestinationConfig>(json!({"mode": "bulk"})).is_err());
    }

    #[test]
    fn test_missing_mode_skips_staging() {
        let redshift = json!({
            "type": "redshift",
            "datasource": {"host": "h", "db": "d", "username": "u"}
        });
        assert!(matches!(
            parse(redshift).resolve().unwrap(),
            Destination::Redshift { staging: None, .. }
        ));

        let bigquery = json!({
            "type": "bigquery",
            "mode": "",
            "google": {"key_file": "/etc/key.json", "bq_project": "p"}
        });
        assert!(matches!(
            parse(bigquery).resolve().unwrap(),
            Destination::BigQuery { staging: None, .. }
        ));
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        let err = parse(json!({"type": "mysql", "datasource": {"host": "h"}}))
            .resolve()
            .unwrap_err();
        assert!(matches!(&err, DestinationError::UnsupportedType(t) if t == "mysql"));
        assert_eq!(err.to_string(), "unsupported destination type mysql");
    }

    #[test]
    fn test_absent_sub_config() {
        assert_eq!(resolve_err(json!({"type": "postgres"})), "Datasource config is required");
        assert_eq!(resolve_err(json!({"type": "clickhouse"})), "ClickHouse config is required");
        assert_eq!(resolve_err(json!({"type": "webhook"})), "WebHook config is required");
        assert_eq!(resolve_err(json!({"type": "bigquery"})), "Google config is required");
    }

    #[test]
    fn test_datasource_required_fields() {
        assert_eq!(
            resolve_err(json!({"type": "postgres", "datasource": {"db": "d", "username": "u"}})),
            "Datasource host is required parameter"
        );
        assert_eq!(
            resolve_err(json!({"type": "postgres", "datasource": {"host": "h", "username": "u"}})),
            "Datasource db is required parameter"
        );
    }

    #[test]
    fn test_clickhouse_rules() {
        let base = |dsns: Value, cluster: Value| {
            json!({
                "type": "clickhouse",
                "clickhouse": {"dsns": dsns, "cluster": cluster, "db": "events"}
            })
        };

        assert_eq!(resolve_err(base(json!([]), Value::Null)), "dsn is required parameter");
        assert_eq!(resolve_err(base(json!(["  "]), Value::Null)), "DSNs values can't be empty");
        assert_eq!(
            resolve_err(base(json!(["tcp://ch:9000"]), Value::Null)),
            "DSNs must have http:// or https:// prefix"
        );
        assert_eq!(
            resolve_err(base(json!(["http://a:8123", "http://b:8123"]), Value::Null)),
            "cluster is required parameter when dsns count > 1"
        );
        assert!(parse(base(json!(["http://a:8123", "http://b:8123"]), json!("c1")))
            .resolve()
            .is_ok());
    }

    #[test]
    fn test_redshift_batch_requires_s3() {
        let stream = json!({
            "type": "redshift",
            "mode": "stream",
            "datasource": {"host": "h", "db": "d", "username": "u"}
        });
        assert!(matches!(
            parse(stream).resolve().unwrap(),
            Destination::Redshift { staging: None, .. }
        ));

        let batch = json!({
            "type": "redshift",
            "mode": "batch",
            "datasource": {"host": "h", "db": "d", "username": "u"},
            "s3": {"access_key_id": "a", "secret_access_key": "s", "bucket": "b"}
        });
        assert_eq!(resolve_err(batch), "S3 region is required parameter");
    }

    #[test]
    fn test_bigquery_stream_mode_skips_bucket() {
        let config = json!({
            "type": "bigquery",
            "mode": "stream",
            "google": {"key_file": {"type": "service_account"}, "bq_project": "p"}
        });
        assert!(matches!(
            parse(config).resolve().unwrap(),
            Destination::BigQuery { staging: None, .. }
        ));

        let batch = json!({
            "type": "bigquery",
            "mode": "batch",
            "google": {"key_file": "/etc/key.json", "bq_project": "p"}
        });
        assert_eq!(
            resolve_err(batch),
            "Google cloud storage bucket(gcs_bucket) is required parameter"
        );

        let no_project = json!({
            "type": "bigquery",
            "google": {"key_file": "/etc/key.json", "gcs_bucket": "b"}
        });
        assert_eq!(
            resolve_err(no_project),
            "BigQuery project(bq_project) is required parameter"
        );
    }

    #[test]
    fn test_snowflake_staging_selection() {
        let snowflake = json!({"account": "a", "db": "d", "username": "u", "warehouse": "w"});

        let gcs_only = json!({
            "type": "snowflake",
            "mode": "batch",
            "snowflake": snowflake,
            "s3": {"bucket": ""},
            "google": {"key_file": "/k.json", "gcs_bucket": "stage"}
        });
        let config = parse(gcs_only);
        match config.resolve().unwrap() {
            Destination::Snowflake { staging, .. } => {
                assert_eq!(staging.map(|s| s.kind()), Some("gcs"))
            }
            other => panic!("unexpected destination {:?}", other),
        }

        let no_staging = json!({"type": "snowflake", "snowflake": snowflake});
        assert!(matches!(
            parse(no_staging).resolve().unwrap(),
            Destination::Snowflake { staging: None, .. }
        ));
    }

    #[test]
    fn test_webhook_url_must_be_absolute() {
        assert_eq!(
            resolve_err(json!({"type": "webhook", "webhook": {}})),
            "'url' is required parameter"
        );
        assert_eq!(
            resolve_err(json!({"type": "webhook", "webhook": {"url": "/relative"}})),
            "'url' must be an absolute http(s) URL"
        );
        assert!(parse(json!({"type": "webhook", "webhook": {"url": "https://hooks.example.com/x"}}))
            .resolve()
            .is_ok());
    }

    #[test]
    fn test_other_sub_configs_are_ignored() {
        let config = json!({
            "type": "google_analytics",
            "google_analytics": {"tracking_id": "UA-1"},
            "datasource": {},
            "unknown_field": true
        });
        assert_eq!(
            parse(config).resolve().unwrap().destination_type(),
            DestinationType::GoogleAnalytics
        );
    }
}
