use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::config::AppConfig;
use crate::services::gazetteer::Gazetteer;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

pub async fn health_check(
    gazetteer: web::Data<Arc<Gazetteer>>,
    config: web::Data<AppConfig>,
) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let gazetteer_status = ServiceStatus {
        status: if gazetteer.is_empty() { "error" } else { "ok" }.to_string(),
        details: Some(format!(
            "{} locations, {} categories",
            gazetteer.len(),
            gazetteer.category_counts().len()
        )),
    };
    health
        .services
        .insert("gazetteer".to_string(), gazetteer_status.clone());

    health.services.insert(
        "vector_index".to_string(),
        ServiceStatus {
            status: "configured".to_string(),
            details: Some(format!(
                "{} / {}",
                config.qdrant_url, config.qdrant_collection
            )),
        },
    );

    health.services.insert(
        "route_provider".to_string(),
        ServiceStatus {
            status: if config.openroute_api_key.is_some() {
                "configured"
            } else {
                "haversine_fallback"
            }
            .to_string(),
            details: None,
        },
    );

    if gazetteer_status.status != "ok" {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}
