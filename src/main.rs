// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::ServerConfig;
use crate::services::fetcher::UrlStrategy;
use crate::services::{
    MemorySessionStore, RedisSessionStore, SessionDriver, SessionStore, SourceFetcher,
};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<dyn SessionStore>,
    driver: Arc<SessionDriver>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting contact sheet service...");

    let config = ServerConfig::from_env();

    // Initialize services
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            info!("Keeping sessions in Redis");
            Arc::new(RedisSessionStore::new(url, config.session_ttl_secs).await?)
        }
        None => {
            info!("REDIS_URL not set, keeping sessions in memory");
            Arc::new(MemorySessionStore::new(Duration::from_secs(
                config.session_ttl_secs as u64,
            )))
        }
    };
    let fetcher = Arc::new(SourceFetcher::new(
        config.fetch_timeout,
        &config.user_agent,
        config.url_strategy.clone(),
    )?);
    let base_links = matches!(config.url_strategy, UrlStrategy::PathSuffix { .. });
    let driver = Arc::new(SessionDriver::new(fetcher).with_base_links(base_links));

    let app_state = AppState { sessions, driver };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::routes)
            .route("/health", web::get().to(health_check))
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "contact-sheets",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
