//! Production clients behind [`DestinationAdapters`].

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::adapters::{AdapterResult, DestinationAdapters, StagingHandle, WarehouseHandle};
use super::error::DestinationError;
use super::google::{BigQueryHandle, GcsHandle, BIGQUERY_API_URL, STORAGE_API_URL};
use super::snowflake::{account_url, SnowflakeSession};
use super::types::{
    ClickHouseConfig, DataSourceConfig, FacebookConversionConfig, GoogleConfig, S3Config,
    SnowflakeConfig,
};

pub const DEFAULT_FACEBOOK_GRAPH_URL: &str = "https://graph.facebook.com/v12.0";

const POSTGRES_PORT: u16 = 5432;
const REDSHIFT_PORT: u16 = 5439;

/// Go-driver DSN options that ClickHouse itself would reject as unknown settings
const CLICKHOUSE_DRIVER_PARAMS: [&str; 4] = ["timeout", "read_timeout", "write_timeout", "debug"];

pub struct LiveAdapters {
    http: Client,
    facebook_graph_url: String,
    bigquery_api_url: String,
    storage_api_url: String,
    snowflake_url: Option<String>,
}

impl Default for LiveAdapters {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveAdapters {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            facebook_graph_url: DEFAULT_FACEBOOK_GRAPH_URL.to_string(),
            bigquery_api_url: BIGQUERY_API_URL.to_string(),
            storage_api_url: STORAGE_API_URL.to_string(),
            snowflake_url: None,
        }
    }

    pub fn with_facebook_graph_url(mut self, url: impl Into<String>) -> Self {
        self.facebook_graph_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Points BigQuery and GCS calls at one base URL.
    pub fn with_google_api_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.bigquery_api_url = url.clone();
        self.storage_api_url = url;
        self
    }

    /// Replaces the per-account `snowflakecomputing.com` host.
    pub fn with_snowflake_url(mut self, url: impl Into<String>) -> Self {
        self.snowflake_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    async fn open_pg(
        &self,
        backend: &'static str,
        config: &DataSourceConfig,
        default_port: u16,
    ) -> AdapterResult<Box<dyn WarehouseHandle>> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port.unwrap_or(default_port))
            .database(&config.db)
            .username(&config.username)
            .password(&config.password);

        if let Some(schema) = config.schema.as_deref().filter(|s| !s.is_empty()) {
            options = options.options([("search_path", schema)]);
        }
        if let Some(mode) = config.parameters.get("sslmode") {
            let mode: PgSslMode = mode
                .parse()
                .map_err(|e| DestinationError::connection(backend, e))?;
            options = options.ssl_mode(mode);
        }

        let connection = options
            .connect()
            .await
            .map_err(|e| DestinationError::connection(backend, e))?;
        debug!(host = %config.host, "{} connection opened", backend);

        Ok(Box::new(PgHandle {
            backend,
            connection: Mutex::new(Some(connection)),
        }))
    }
}

struct PgHandle {
    backend: &'static str,
    connection: Mutex<Option<PgConnection>>,
}

#[async_trait]
impl WarehouseHandle for PgHandle {
    async fn test(&self) -> AdapterResult<()> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| {
                DestinationError::connection(self.backend, "connection already closed")
            })?;

        sqlx::query("SELECT 1")
            .execute(connection)
            .await
            .map_err(|e| DestinationError::connection(self.backend, e))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close {} connection: {}", self.backend, e);
            }
        }
    }
}

/// ClickHouse over its HTTP interface; stateless, so `close` releases nothing.
struct ClickHouseHandle {
    http: Client,
    endpoint: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
}

impl ClickHouseHandle {
    fn from_dsn(http: Client, dsn: &Url, db: &str) -> Self {
        let mut endpoint = dsn.clone();
        let username = Some(dsn.username().to_string()).filter(|u| !u.is_empty());
        let password = dsn.password().map(str::to_string);
        let _ = endpoint.set_username("");
        let _ = endpoint.set_password(None);

        let mut timeout = None;
        let mut has_database = false;
        let mut params: Vec<(String, String)> = Vec::new();
        for (key, value) in dsn.query_pairs() {
            if key == "timeout" {
                timeout = parse_duration(&value);
            }
            if CLICKHOUSE_DRIVER_PARAMS.iter().any(|param| *param == key) {
                continue;
            }
            has_database |= key == "database";
            params.push((key.into_owned(), value.into_owned()));
        }
        if !has_database && !db.is_empty() {
            params.push(("database".to_string(), db.to_string()));
        }

        endpoint.set_query(None);
        if !params.is_empty() {
            endpoint.query_pairs_mut().extend_pairs(params);
        }

        Self {
            http,
            endpoint,
            username,
            password,
            timeout,
        }
    }

    async fn select_one(&self) -> AdapterResult<()> {
        let mut request = self.http.post(self.endpoint.clone()).body("SELECT 1");
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DestinationError::connection("clickhouse", e))?;
        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            return Err(DestinationError::UnexpectedStatus {
                backend: "clickhouse",
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseHandle for ClickHouseHandle {
    async fn test(&self) -> AdapterResult<()> {
        self.select_one().await
    }

    async fn close(&mut self) {}
}

/// Parses Go-style durations such as `6s`, `500ms` or `1m`.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        return ms.parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = value.strip_suffix('s') {
        return secs.parse().ok().map(Duration::from_secs);
    }
    if let Some(mins) = value.strip_suffix('m') {
        return mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60));
    }
    None
}

struct S3Handle {
    client: aws_sdk_s3::Client,
    bucket: String,
    folder: Option<String>,
}

impl S3Handle {
    fn probe_key(&self) -> String {
        let name = format!("syncline_write_check_{}", Uuid::new_v4());
        match self.folder.as_deref().map(|f| f.trim_matches('/')) {
            Some(folder) if !folder.is_empty() => format!("{}/{}", folder, name),
            _ => name,
        }
    }
}

#[async_trait]
impl StagingHandle for S3Handle {
    async fn validate_write_permission(&self) -> AdapterResult<()> {
        let key = self.probe_key();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from_static(b"healthcheck"))
            .send()
            .await
            .map_err(|e| DestinationError::write_permission("s3", DisplayErrorContext(e)))?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| DestinationError::write_permission("s3", DisplayErrorContext(e)))?;

        debug!(bucket = %self.bucket, "S3 write permission confirmed");
        Ok(())
    }

    async fn close(&mut self) {}
}

#[async_trait]
impl DestinationAdapters for LiveAdapters {
    async fn open_postgres(
        &self,
        config: &DataSourceConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>> {
        self.open_pg("postgres", config, POSTGRES_PORT).await
    }

    async fn open_clickhouse(
        &self,
        dsn: &Url,
        config: &ClickHouseConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>> {
        let handle = ClickHouseHandle::from_dsn(self.http.clone(), dsn, &config.db);
        handle.select_one().await?;
        Ok(Box::new(handle))
    }

    async fn open_redshift(
        &self,
        config: &DataSourceConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>> {
        self.open_pg("redshift", config, REDSHIFT_PORT).await
    }

    async fn open_bigquery(
        &self,
        config: &GoogleConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>> {
        let handle = BigQueryHandle::open(self.http.clone(), &self.bigquery_api_url, config).await?;
        Ok(Box::new(handle))
    }

    async fn open_snowflake(
        &self,
        config: &SnowflakeConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>> {
        let base_url = self
            .snowflake_url
            .clone()
            .unwrap_or_else(|| account_url(config));
        let session = SnowflakeSession::login(self.http.clone(), &base_url, config).await?;
        Ok(Box::new(session))
    }

    async fn open_s3(&self, config: &S3Config) -> AdapterResult<Box<dyn StagingHandle>> {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "syncline_destination_test",
        );

        let mut loader = aws_config::from_env()
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint.is_some())
            .build();

        Ok(Box::new(S3Handle {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            folder: config.folder.clone(),
        }))
    }

    async fn open_gcs(&self, config: &GoogleConfig) -> AdapterResult<Box<dyn StagingHandle>> {
        let handle = GcsHandle::open(self.http.clone(), &self.storage_api_url, config).await?;
        Ok(Box::new(handle))
    }

    async fn test_facebook_access(&self, config: &FacebookConversionConfig) -> AdapterResult<()> {
        let url = format!("{}/{}", self.facebook_graph_url, config.pixel_id);
        let response = self
            .http
            .get(&url)
            .query(&[("access_token", config.access_token.as_str())])
            .send()
            .await
            .map_err(|e| DestinationError::connection("facebook", e))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        // Graph API errors look like {"error": {"message": "..."}}
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("access check failed")
            .to_string();
        Err(DestinationError::UnexpectedStatus {
            backend: "facebook",
            status: status.as_u16(),
            message,
        })
    }
}
