//! BigQuery and GCS over Google's REST APIs, authorized with a service
//! account JWT exchanged for an OAuth access token.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::adapters::{AdapterResult, StagingHandle, WarehouseHandle};
use super::error::DestinationError;
use super::types::GoogleConfig;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const STORAGE_API_URL: &str = "https://storage.googleapis.com";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// `key_file` holds the key JSON as an object or a string, or a path to it.
    pub async fn load(key_file: Option<&Value>) -> AdapterResult<Self> {
        let parsed = match key_file {
            Some(Value::Object(key)) => serde_json::from_value(Value::Object(key.clone())),
            Some(Value::String(raw)) if raw.trim_start().starts_with('{') => {
                serde_json::from_str(raw)
            }
            Some(Value::String(path)) => {
                let raw = tokio::fs::read_to_string(path.trim()).await.map_err(|e| {
                    DestinationError::connection("google", format!("reading {}: {}", path, e))
                })?;
                serde_json::from_str(&raw)
            }
            _ => return Err(DestinationError::connection("google", "key_file is missing")),
        };

        parsed.map_err(|e| {
            DestinationError::connection("google", format!("invalid key_file: {}", e))
        })
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Signs an RS256 assertion and trades it for a bearer token.
pub async fn fetch_access_token(http: &Client, key: &ServiceAccountKey) -> AdapterResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| DestinationError::connection("google", e))?;
    let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| DestinationError::connection("google", e))?;

    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| DestinationError::connection("google", e))?;
    let response = ensure_success("google", response).await?;

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| DestinationError::connection("google", e))?;
    debug!(client_email = %key.client_email, "Google access token issued");
    Ok(token.access_token)
}

/// Maps a non-2xx answer to `UnexpectedStatus`, using Google's
/// `{"error": {"message": ...}}` body when there is one.
async fn ensure_success(backend: &'static str, response: Response) -> AdapterResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| match &body["error"] {
            Value::Object(error) => {
                error.get("message").and_then(Value::as_str).map(str::to_string)
            }
            Value::String(error) => Some(error.clone()),
            _ => None,
        })
        .unwrap_or_else(|| text.trim().to_string());

    Err(DestinationError::UnexpectedStatus {
        backend,
        status: status.as_u16(),
        message,
    })
}

pub struct BigQueryHandle {
    http: Client,
    api_url: String,
    project: String,
    token: String,
}

impl BigQueryHandle {
    pub async fn open(http: Client, api_url: &str, config: &GoogleConfig) -> AdapterResult<Self> {
        let key = ServiceAccountKey::load(config.key_file.as_ref()).await?;
        let token = fetch_access_token(&http, &key).await?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            project: config.project.clone(),
            token,
        })
    }
}

#[async_trait]
impl WarehouseHandle for BigQueryHandle {
    async fn test(&self) -> AdapterResult<()> {
        let url = format!(
            "{}/projects/{}/queries",
            self.api_url,
            urlencoding::encode(&self.project)
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({"query": "SELECT 1", "useLegacySql": false}))
            .send()
            .await
            .map_err(|e| DestinationError::connection("bigquery", e))?;

        ensure_success("bigquery", response).await?;
        Ok(())
    }

    /// Token auth holds no session.
    async fn close(&mut self) {}
}

pub struct GcsHandle {
    http: Client,
    api_url: String,
    bucket: String,
    token: String,
}

impl GcsHandle {
    pub async fn open(http: Client, api_url: &str, config: &GoogleConfig) -> AdapterResult<Self> {
        let key = ServiceAccountKey::load(config.key_file.as_ref()).await?;
        let token = fetch_access_token(&http, &key).await?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            bucket: config.bucket.clone(),
            token,
        })
    }
}

#[async_trait]
impl StagingHandle for GcsHandle {
    async fn validate_write_permission(&self) -> AdapterResult<()> {
        let name = format!("syncline_write_check_{}", Uuid::new_v4());
        let bucket = urlencoding::encode(&self.bucket);

        let upload = self
            .http
            .post(format!("{}/upload/storage/v1/b/{}/o", self.api_url, bucket))
            .query(&[("uploadType", "media"), ("name", name.as_str())])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body("healthcheck")
            .send()
            .await
            .map_err(|e| DestinationError::write_permission("gcs", e))?;
        ensure_success("gcs", upload)
            .await
            .map_err(|e| DestinationError::write_permission("gcs", e))?;

        let delete = self
            .http
            .delete(format!(
                "{}/storage/v1/b/{}/o/{}",
                self.api_url,
                bucket,
                urlencoding::encode(&name)
            ))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DestinationError::write_permission("gcs", e))?;
        ensure_success("gcs", delete)
            .await
            .map_err(|e| DestinationError::write_permission("gcs", e))?;

        debug!(bucket = %self.bucket, "GCS write permission confirmed");
        Ok(())
    }

    async fn close(&mut self) {}
}
