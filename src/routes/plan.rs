use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde_json::json;

use crate::models::plan::PlanRequest;
use crate::services::planner::{PlanError, PlanningService};

/*
    POST /api/plan
*/
pub async fn create_plan(
    planner: web::Data<Arc<PlanningService>>,
    request: web::Json<PlanRequest>,
) -> impl Responder {
    match planner.plan_trip(&request).await {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(PlanError::InvalidRequest(msg)) => HttpResponse::BadRequest().json(json!({
            "error": msg,
            "kind": "invalid_request"
        })),
        Err(PlanError::NoAttractionsFound) => HttpResponse::NotFound().json(json!({
            "error": "No attractions found for your preferences",
            "kind": "no_attractions"
        })),
        Err(err @ PlanError::Index(_)) => {
            error!("Plan generation failed: {}", err);
            HttpResponse::BadGateway().json(json!({
                "error": "Attraction retrieval is currently unavailable",
                "kind": "index_unavailable"
            }))
        }
    }
}
