//! Syncline data service: source connectors, destination connection tests
//! and the HTTP front end over them.

pub mod connectors;
pub mod destinations;
pub mod errors;
pub mod handlers;
pub mod state;

pub use errors::ServiceError;
pub use state::AppState;
