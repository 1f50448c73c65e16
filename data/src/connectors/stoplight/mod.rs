//! Stoplight CRM connector: calendars, contacts and opportunities.

pub mod config;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info};

use syncline_drivers::http::{fetch_json, records_from};
use syncline_drivers::validation::Validate;
use syncline_drivers::{
    CollectionConfig, Driver, DriverError, DriverRegistry, DriverResult, Granularity, ObjectsLoader,
    RecordBatch, RequestContext, SourceConfig, TimeInterval,
};

pub use config::StoplightConfig;

pub const STOPLIGHT_TYPE: &str = "stoplight";

/// Upstream entity types, in the order they are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Calendars,
    Contacts,
    Opportunities,
}

impl Entity {
    pub const ALL: [Entity; 3] = [Entity::Calendars, Entity::Contacts, Entity::Opportunities];

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Calendars => "calendars",
            Entity::Contacts => "contacts",
            Entity::Opportunities => "opportunities",
        }
    }
}

pub struct StoplightDriver {
    client: Client,
    ctx: RequestContext,
    collection: CollectionConfig,
    config: StoplightConfig,
}

impl StoplightDriver {
    pub fn new(
        ctx: &RequestContext,
        source: &SourceConfig,
        collection: &CollectionConfig,
    ) -> DriverResult<Self> {
        let config: StoplightConfig = source.decode_config()?;
        config.validate()?;

        Ok(Self {
            client: Client::new(),
            ctx: ctx.clone(),
            collection: collection.clone(),
            config,
        })
    }

    /// Add both the driver constructor and the connectivity probe to `registry`
    pub fn register(registry: &mut DriverRegistry) -> DriverResult<()> {
        registry.register_driver(STOPLIGHT_TYPE, |ctx, source, collection| {
            Ok(Box::new(StoplightDriver::new(ctx, source, collection)?) as Box<dyn Driver>)
        })?;
        registry.register_test_connection(STOPLIGHT_TYPE, test_connection)
    }

    async fn fetch(&self, entity: Entity) -> DriverResult<RecordBatch> {
        let url = format!("{}/{}/", self.config.base_url(), entity.as_str());
        let request = authorized(&self.client, &self.config, &url);

        let body = fetch_json(&self.ctx, STOPLIGHT_TYPE, request).await?;
        let records = records_from(STOPLIGHT_TYPE, entity.as_str(), body)?;
        debug!(entity = entity.as_str(), count = records.len(), "Fetched Stoplight objects");

        Ok(RecordBatch::new(entity.as_str(), records))
    }
}

fn authorized(client: &Client, config: &StoplightConfig, url: &str) -> RequestBuilder {
    client
        .get(url)
        .bearer_auth(&config.access_token)
        .header("Version", &config.api_version)
}

/// Checks credentials with one cheap read, without building a driver.
/// Collections need not be configured yet.
pub async fn test_connection(ctx: RequestContext, source: SourceConfig) -> DriverResult<()> {
    let config: StoplightConfig = source.decode_config()?;
    config.validate_credentials()?;

    let url = match config.calendar_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(calendar_id) => format!("{}/calendars/{}", config.base_url(), calendar_id),
        None => format!("{}/calendars/", config.base_url()),
    };

    let client = Client::new();
    match fetch_json(&ctx, STOPLIGHT_TYPE, authorized(&client, &config, &url)).await? {
        Value::Null => Err(DriverError::EmptyResponse(STOPLIGHT_TYPE.to_string())),
        _ => Ok(()),
    }
}

#[async_trait]
impl Driver for StoplightDriver {
    fn source_type(&self) -> &str {
        STOPLIGHT_TYPE
    }

    fn collection(&self) -> &CollectionConfig {
        &self.collection
    }

    fn replace_tables(&self) -> bool {
        false
    }

    async fn available_intervals(&self) -> DriverResult<Vec<TimeInterval>> {
        // The list endpoints are not partitioned by time.
        Ok(vec![TimeInterval::new(Granularity::All, Utc::now())])
    }

    async fn get_objects_for(
        &self,
        interval: &TimeInterval,
        loader: &dyn ObjectsLoader,
    ) -> DriverResult<()> {
        let mut batches = Vec::with_capacity(Entity::ALL.len());
        for entity in Entity::ALL {
            batches.push(self.fetch(entity).await?);
        }

        let total: usize = batches.iter().map(RecordBatch::len).sum();
        info!(
            collection = %self.collection.name,
            interval = %interval,
            total,
            "Loading Stoplight objects"
        );
        loader.load(interval, batches).await
    }
}
