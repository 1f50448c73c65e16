use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use syncline_config::AppConfig;
use syncline_data::connectors::default_registry;
use syncline_data::destinations::LiveAdapters;
use syncline_data::handlers::configure_routes;
use syncline_data::AppState;
use syncline_observability::{init_tracing, TracingConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(TracingConfig::for_service("data-service"))
        .context("Failed to initialize tracing")?;

    let registry = default_registry().context("Failed to register source drivers")?;
    let state = AppState::new(&config, registry, Arc::new(LiveAdapters::new()));
    let shutdown = state.shutdown.clone();

    let (host, port) = config.bind_address();
    info!("🚀 [Data Service] Starting on {}:{} ({})", host, port, config.environment);

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await?;

    shutdown.cancel();
    info!("👋 [Data Service] Stopped");
    Ok(())
}
