use async_trait::async_trait;
use url::Url;

use super::error::DestinationError;
use super::types::{
    ClickHouseConfig, DataSourceConfig, FacebookConversionConfig, GoogleConfig, S3Config,
    SnowflakeConfig,
};

pub type AdapterResult<T> = Result<T, DestinationError>;

/// An open warehouse session.
#[async_trait]
pub trait WarehouseHandle: Send + Sync {
    /// Cheap query proving the session can run statements
    async fn test(&self) -> AdapterResult<()>;

    /// Release the session. Failures are logged by the implementation.
    async fn close(&mut self);
}

/// An open object store used for staging.
#[async_trait]
pub trait StagingHandle: Send + Sync {
    /// Write and remove a probe object
    async fn validate_write_permission(&self) -> AdapterResult<()>;

    async fn close(&mut self);
}

/// Client factories for every destination backend.
///
/// Implementations only open clients; the connection tester owns the probe
/// sequence and always closes what it opened.
#[async_trait]
pub trait DestinationAdapters: Send + Sync {
    async fn open_postgres(
        &self,
        config: &DataSourceConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>>;

    /// `dsn` is already trimmed and carries the `timeout` query parameter.
    async fn open_clickhouse(
        &self,
        dsn: &Url,
        config: &ClickHouseConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>>;

    async fn open_redshift(
        &self,
        config: &DataSourceConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>>;

    async fn open_bigquery(&self, config: &GoogleConfig) -> AdapterResult<Box<dyn WarehouseHandle>>;

    async fn open_snowflake(
        &self,
        config: &SnowflakeConfig,
    ) -> AdapterResult<Box<dyn WarehouseHandle>>;

    async fn open_s3(&self, config: &S3Config) -> AdapterResult<Box<dyn StagingHandle>>;

    async fn open_gcs(&self, config: &GoogleConfig) -> AdapterResult<Box<dyn StagingHandle>>;

    async fn test_facebook_access(&self, config: &FacebookConversionConfig) -> AdapterResult<()>;
}
