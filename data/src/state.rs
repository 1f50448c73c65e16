use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use syncline_config::AppConfig;
use syncline_drivers::{DriverRegistry, RequestContext};

use crate::destinations::{DestinationAdapters, DestinationTester};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DriverRegistry>,
    pub destinations: DestinationTester,
    pub source_request_timeout: Duration,
    pub destination_probe_timeout: Duration,
    /// Cancelled on shutdown so in-flight probes stop
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        registry: DriverRegistry,
        adapters: Arc<dyn DestinationAdapters>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            destinations: DestinationTester::new(adapters)
                .with_clickhouse_dsn_timeout(config.clickhouse_dsn_timeout.clone()),
            source_request_timeout: config.source_request_timeout,
            destination_probe_timeout: config.destination_probe_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn source_context(&self) -> RequestContext {
        RequestContext::with_cancellation(self.shutdown.child_token(), self.source_request_timeout)
    }

    pub fn destination_context(&self) -> RequestContext {
        RequestContext::with_cancellation(
            self.shutdown.child_token(),
            self.destination_probe_timeout,
        )
    }
}
