//! Destination configs and live connectivity tests.

pub mod adapters;
pub mod dispatcher;
pub mod error;
pub mod google;
pub mod live;
pub mod snowflake;
pub mod types;

pub use adapters::{AdapterResult, DestinationAdapters, StagingHandle, WarehouseHandle};
pub use dispatcher::DestinationTester;
pub use error::{AggregateError, DestinationError};
pub use live::LiveAdapters;
pub use types::*;
