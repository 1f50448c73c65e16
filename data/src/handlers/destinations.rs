use actix_web::{web, HttpResponse, Result};
use tracing::{error, info};

use crate::destinations::DestinationConfig;
use crate::errors::ServiceError;
use crate::state::AppState;

/// Validate a destination config and probe the backend it describes
pub async fn test_destination(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ServiceError> {
    let config: DestinationConfig = serde_json::from_slice(&body).map_err(|e| {
        error!("Error parsing destinations body: {}", e);
        ServiceError::from(e)
    })?;

    info!("🔌 Testing {} destination connection", config.destination_type);

    let ctx = state.destination_context();
    state.destinations.test_connection(&ctx, &config).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true
    })))
}
