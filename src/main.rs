use actix_web::web::Data;
use actix_web::{App, HttpServer};
use log::{error, info};
use pollrank::RankingEngine;
use pollrank::db::Database;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    // Initialize database
    let database = match Database::new().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let engine = RankingEngine::new(database);

    // --- Start Background Task for Cache Maintenance ---
    let aggregator = engine.aggregator.clone();
    tokio::spawn(async move {
        pollrank::tasks::cache_sweep::counts_cache_sweep_task(aggregator).await;
    });
    // --- End Background Task ---

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    info!("pollrank listening on {}", bind_addr);

    let engine = Data::new(engine);
    HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .configure(pollrank::web::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
