//! Read-only matchmaking REST surface.
//
//  The live protocol runs over the WS push channel; this mirrors the queue
//  snapshot for dashboards and polling clients.

use std::sync::Arc;

use actix_web::{get, web, HttpResponse, Responder};

use crate::matchmaking::MatchmakingEngine;
use crate::validate;

/// GET /api/matchmaking/queue/{round}
#[get("/matchmaking/queue/{round}")]
async fn queue_status(
    path: web::Path<u32>,
    engine: web::Data<Arc<MatchmakingEngine>>,
) -> impl Responder {
    let round = path.into_inner();
    if let Err(e) = validate::validate_round_number(round) {
        return HttpResponse::BadRequest().body(e.to_string());
    }

    match engine.queue_status(round).await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => {
            log::warn!("queue status read failed for round {round}: {e}");
            HttpResponse::ServiceUnavailable().body("shared store unavailable")
        }
    }
}

/// Mount
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(queue_status);
}
