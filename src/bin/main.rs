use std::env;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use redis::Client as RedisClient;
use sqlx::postgres::PgPoolOptions;
use tourney_server::{
    dispatch::PushDispatcher, http, matchmaking::MatchmakingEngine, metrics,
    persistence::PgPersistence, store::SharedStore, ws,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    // Configuration
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
    let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());

    // Postgres pool (analytics mirror)
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to create Postgres pool");

    // Shared store
    let redis_client = RedisClient::open(redis_url.as_str()).expect("Invalid REDIS_URL");
    let store = Arc::new(SharedStore::new(redis_client));

    // Core wiring: engine pushes through the dispatcher without knowing it
    let persistence = Arc::new(PgPersistence::new(db_pool.clone()));
    let engine = MatchmakingEngine::new((*store).clone(), persistence);
    let dispatcher = PushDispatcher::new(engine.clone());
    engine.set_observer(dispatcher.clone());

    // Background loops: search GC and session heartbeats
    engine.start_cleanup_task();
    dispatcher.start_heartbeat();

    // Start HTTP + WS server
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(engine.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .configure(http::routes::init_routes)
            .configure(ws::routes::init_routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}
