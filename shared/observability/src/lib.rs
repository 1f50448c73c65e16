//! Syncline observability
//!
//! Structured logging setup shared by the Syncline services: pretty output
//! for development, JSON for production, filtered through `RUST_LOG`.

pub mod init;

pub use init::*;

// Re-export tracing for convenience
pub use tracing::{debug, error, info, instrument, trace, warn, Instrument, Level};
