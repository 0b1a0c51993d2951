//! Simple liveness / readiness probe

use std::sync::Arc;

use actix_web::{get, web, HttpResponse, Responder};
use sqlx::PgPool;

use crate::store::SharedStore;

#[get("/healthz")]
pub async fn healthz(db: web::Data<PgPool>, store: web::Data<Arc<SharedStore>>) -> impl Responder {
    // Check Postgres
    if sqlx::query("SELECT 1").execute(&**db).await.is_err() {
        return HttpResponse::ServiceUnavailable().body("db");
    }

    // Check the shared store
    if store.ping().await.is_err() {
        return HttpResponse::ServiceUnavailable().body("store");
    }

    HttpResponse::Ok().body("ok")
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}
