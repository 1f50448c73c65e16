pub mod destinations;
pub mod sources;

use actix_web::{web, HttpResponse, Result};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/destinations/test", web::post().to(destinations::test_destination))
            .route("/sources/test", web::post().to(sources::test_source))
            .route("/sources/types", web::get().to(sources::list_source_types)),
    )
    .route("/health", web::get().to(health_check));
}

pub async fn health_check() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "data-service",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
