pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod interval;
pub mod registry;
pub mod validation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use config::{CollectionConfig, SourceConfig};
pub use context::{Interrupted, RequestContext};
pub use error::DriverError;
pub use interval::{Granularity, TimeInterval};
pub use registry::DriverRegistry;
pub use validation::{validate_required, Validate, ValidationError};

/// Lookback re-scanned on every sync for slowly changing collections.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(31 * 24 * 60 * 60);

/// A loosely typed upstream object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Records of one entity type fetched for a single interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub entity: String,
    pub records: Vec<Record>,
}

impl RecordBatch {
    pub fn new(entity: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            entity: entity.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sink that receives extracted batches. Implemented by the loader on the
/// destination write path; drivers never write to storage themselves.
#[async_trait]
pub trait ObjectsLoader: Send + Sync {
    async fn load(&self, interval: &TimeInterval, batches: Vec<RecordBatch>) -> DriverResult<()>;
}

/// Extraction unit bound to one source type and one collection.
///
/// A driver lives for one sync session. It must be safe to call repeatedly
/// and sequentially, so implementations keep no state between calls to
/// [`Driver::get_objects_for`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Registry key of the connector type
    fn source_type(&self) -> &str;

    /// Collection this driver was constructed for
    fn collection(&self) -> &CollectionConfig;

    fn collection_table(&self) -> String {
        self.collection().table_name().to_string()
    }

    /// State key used by the scheduler; stable across restarts.
    fn collection_meta_key(&self) -> String {
        format!("{}_{}", self.collection().name, self.collection_table())
    }

    fn refresh_window(&self) -> Duration {
        DEFAULT_REFRESH_WINDOW
    }

    /// `true` when a sync run fully replaces the destination table
    fn replace_tables(&self) -> bool;

    /// Intervals the upstream can currently serve
    async fn available_intervals(&self) -> DriverResult<Vec<TimeInterval>>;

    /// Fetch every object for `interval` and hand them to `loader` in one call.
    async fn get_objects_for(
        &self,
        interval: &TimeInterval,
        loader: &dyn ObjectsLoader,
    ) -> DriverResult<()>;
}

pub type DriverResult<T> = Result<T, DriverError>;
