use actix_web::{web, HttpResponse, Result};
use tracing::{error, info};

use syncline_drivers::validation::Validate;
use syncline_drivers::SourceConfig;

use crate::errors::ServiceError;
use crate::state::AppState;

/// Run the registered connectivity probe for a source config
pub async fn test_source(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ServiceError> {
    let source: SourceConfig = serde_json::from_slice(&body).map_err(|e| {
        error!("Error parsing source body: {}", e);
        ServiceError::from(e)
    })?;

    source
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    info!("🔌 Testing {} source {}", source.source_type, source.source_id);

    let ctx = state.source_context();
    state.registry.test_connection(&ctx, &source).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true
    })))
}

/// List registered source types
pub async fn list_source_types(state: web::Data<AppState>) -> Result<HttpResponse> {
    let types = state.registry.source_types();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "source_types": types
    })))
}
