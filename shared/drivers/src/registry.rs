use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CollectionConfig, SourceConfig};
use crate::context::RequestContext;
use crate::error::DriverError;
use crate::validation::Validate;
use crate::{Driver, DriverResult};

/// Builds a driver for one (source, collection) pair
pub type DriverConstructor = Arc<
    dyn Fn(&RequestContext, &SourceConfig, &CollectionConfig) -> DriverResult<Box<dyn Driver>>
        + Send
        + Sync,
>;

/// Cheap read-only connectivity probe that needs no driver instance
pub type TestConnectionFn =
    Arc<dyn Fn(RequestContext, SourceConfig) -> BoxFuture<'static, DriverResult<()>> + Send + Sync>;

/// Maps source type ids to driver constructors and connectivity probes.
///
/// Built once by the service's assembly root and shared read-only afterwards.
/// Registration takes `&mut self`, so it can only happen before the registry
/// is shared; registering a type id twice is rejected and keeps the first
/// registration.
#[derive(Default)]
pub struct DriverRegistry {
    constructors: HashMap<String, DriverConstructor>,
    test_connections: HashMap<String, TestConnectionFn>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver constructor for `source_type`
    pub fn register_driver<F>(&mut self, source_type: &str, constructor: F) -> DriverResult<()>
    where
        F: Fn(&RequestContext, &SourceConfig, &CollectionConfig) -> DriverResult<Box<dyn Driver>>
            + Send
            + Sync
            + 'static,
    {
        if self.constructors.contains_key(source_type) {
            return Err(DriverError::AlreadyRegistered(source_type.to_string()));
        }

        self.constructors
            .insert(source_type.to_string(), Arc::new(constructor));
        info!("Registered driver for source type {}", source_type);
        Ok(())
    }

    /// Register the connectivity probe for `source_type`
    pub fn register_test_connection<F, Fut>(
        &mut self,
        source_type: &str,
        test_fn: F,
    ) -> DriverResult<()>
    where
        F: Fn(RequestContext, SourceConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DriverResult<()>> + Send + 'static,
    {
        if self.test_connections.contains_key(source_type) {
            return Err(DriverError::AlreadyRegistered(source_type.to_string()));
        }

        let boxed: TestConnectionFn = Arc::new(move |ctx, source| Box::pin(test_fn(ctx, source)));
        self.test_connections.insert(source_type.to_string(), boxed);
        info!("Registered test connection for source type {}", source_type);
        Ok(())
    }

    pub fn is_registered(&self, source_type: &str) -> bool {
        self.constructors.contains_key(source_type)
    }

    pub fn has_test_connection(&self, source_type: &str) -> bool {
        self.test_connections.contains_key(source_type)
    }

    /// Registered source type ids, sorted
    pub fn source_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Construct a driver for `collection` of `source`
    pub fn create_driver(
        &self,
        ctx: &RequestContext,
        source: &SourceConfig,
        collection: &CollectionConfig,
    ) -> DriverResult<Box<dyn Driver>> {
        let constructor = self
            .constructors
            .get(&source.source_type)
            .ok_or_else(|| DriverError::UnknownSourceType(source.source_type.clone()))?;

        source.validate()?;
        collection.validate()?;

        debug!(
            source_id = %source.source_id,
            collection = %collection.name,
            "Creating {} driver", source.source_type
        );
        constructor(ctx, source, collection)
    }

    /// Run the registered connectivity probe for `source`
    pub async fn test_connection(
        &self,
        ctx: &RequestContext,
        source: &SourceConfig,
    ) -> DriverResult<()> {
        let test_fn = match self.test_connections.get(&source.source_type) {
            Some(test_fn) => Arc::clone(test_fn),
            None if self.is_registered(&source.source_type) => {
                return Err(DriverError::TestConnectionUnsupported(source.source_type.clone()))
            }
            None => return Err(DriverError::UnknownSourceType(source.source_type.clone())),
        };

        test_fn(ctx.clone(), source.clone()).await
    }
}
