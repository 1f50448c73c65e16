use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use syncline_drivers::RequestContext;

use super::adapters::{AdapterResult, DestinationAdapters, WarehouseHandle};
use super::error::{AggregateError, DestinationError};
use super::types::{ClickHouseConfig, Destination, DestinationConfig, StagingStorage};

/// Value of the `timeout` query parameter added to every ClickHouse DSN
pub const DEFAULT_CLICKHOUSE_DSN_TIMEOUT: &str = "6s";

/// Validates destination configs and probes the backends they point to.
///
/// Every handle opened during a probe is closed before the result is
/// returned, whether the probe succeeded or not.
#[derive(Clone)]
pub struct DestinationTester {
    adapters: Arc<dyn DestinationAdapters>,
    clickhouse_dsn_timeout: String,
}

impl DestinationTester {
    pub fn new(adapters: Arc<dyn DestinationAdapters>) -> Self {
        Self {
            adapters,
            clickhouse_dsn_timeout: DEFAULT_CLICKHOUSE_DSN_TIMEOUT.to_string(),
        }
    }

    pub fn with_clickhouse_dsn_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.clickhouse_dsn_timeout = timeout.into();
        self
    }

    /// Accepts the config only if it validates and every backend it names
    /// answers.
    pub async fn test_connection(
        &self,
        ctx: &RequestContext,
        config: &DestinationConfig,
    ) -> Result<(), DestinationError> {
        let destination = config.resolve()?;
        let destination_type = destination.destination_type();
        debug!(%destination_type, mode = ?config.mode, "Testing destination connection");

        let result = self.probe(ctx, destination).await;
        match &result {
            Ok(()) => info!(%destination_type, "Destination connection test passed"),
            Err(e) => warn!(%destination_type, "Destination connection test failed: {}", e),
        }
        result
    }

    async fn probe(
        &self,
        ctx: &RequestContext,
        destination: Destination<'_>,
    ) -> Result<(), DestinationError> {
        let adapters = self.adapters.as_ref();

        match destination {
            Destination::Postgres(datasource) => {
                self.probe_warehouse(ctx, adapters.open_postgres(datasource), false)
                    .await
            }
            Destination::ClickHouse(clickhouse) => self.probe_clickhouse(ctx, clickhouse).await,
            Destination::Redshift { datasource, staging } => {
                self.probe_staging(ctx, staging).await?;
                self.probe_warehouse(ctx, adapters.open_redshift(datasource), false)
                    .await
            }
            Destination::BigQuery { google, staging } => {
                self.probe_staging(ctx, staging).await?;
                self.probe_warehouse(ctx, adapters.open_bigquery(google), true)
                    .await
            }
            Destination::Snowflake { snowflake, staging } => {
                self.probe_staging(ctx, staging).await?;
                self.probe_warehouse(ctx, adapters.open_snowflake(snowflake), false)
                    .await
            }
            Destination::GoogleAnalytics(_) | Destination::WebHook(_) => Ok(()),
            Destination::Facebook(facebook) => {
                ctx.run(adapters.test_facebook_access(facebook)).await
            }
        }
    }

    /// Open, optionally test, then close a warehouse session.
    async fn probe_warehouse<F>(
        &self,
        ctx: &RequestContext,
        open: F,
        run_test: bool,
    ) -> Result<(), DestinationError>
    where
        F: Future<Output = AdapterResult<Box<dyn WarehouseHandle>>>,
    {
        let mut handle = ctx.run(open).await?;

        let result = if run_test {
            ctx.run(handle.test()).await
        } else {
            Ok(())
        };

        handle.close().await;
        result
    }

    async fn probe_staging(
        &self,
        ctx: &RequestContext,
        staging: Option<StagingStorage<'_>>,
    ) -> Result<(), DestinationError> {
        let Some(staging) = staging else {
            return Ok(());
        };

        let mut handle = match staging {
            StagingStorage::S3(s3) => ctx.run(self.adapters.open_s3(s3)).await?,
            StagingStorage::Gcs(google) => ctx.run(self.adapters.open_gcs(google)).await?,
        };

        let result = ctx.run(handle.validate_write_permission()).await;
        handle.close().await;

        debug!(staging = staging.kind(), ok = result.is_ok(), "Staging storage probed");
        result
    }

    /// Probes every DSN concurrently and collects one error per failing DSN.
    async fn probe_clickhouse(
        &self,
        ctx: &RequestContext,
        config: &ClickHouseConfig,
    ) -> Result<(), DestinationError> {
        let probes = config
            .dsns
            .iter()
            .map(|dsn| self.probe_clickhouse_dsn(ctx, config, dsn));

        let mut errors = AggregateError::new();
        errors.extend(join_all(probes).await.into_iter().filter_map(Result::err));
        errors.into_result()
    }

    async fn probe_clickhouse_dsn(
        &self,
        ctx: &RequestContext,
        config: &ClickHouseConfig,
        dsn: &str,
    ) -> Result<(), DestinationError> {
        let url = with_timeout(dsn, &self.clickhouse_dsn_timeout)?;
        self.probe_warehouse(ctx, self.adapters.open_clickhouse(&url, config), false)
            .await
    }
}

/// Parses a trimmed DSN and sets its `timeout` query parameter, replacing
/// any value already present.
fn with_timeout(dsn: &str, timeout: &str) -> Result<Url, DestinationError> {
    let mut url = Url::parse(dsn.trim()).map_err(|e| DestinationError::InvalidEndpoint {
        dsn: dsn.to_string(),
        reason: e.to_string(),
    })?;

    let params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "timeout")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(params)
        .append_pair("timeout", timeout);
    Ok(url)
}
