//! bbs-tally server entry point.
//!
//! Boots the HTTP API and the daily batch scheduler. Logging goes to
//! stderr as JSON; actix's request log is routed through the same
//! subscriber.

use actix_web::{App, HttpServer, middleware, web};
use anyhow::Result;
use tally_client::{Aggregator, RunCache};
use tally_core::{AppConfig, HistoryDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handlers;
mod scheduler;

use handlers::AppState;

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(sites = config.sites.len(), db = %config.db_path.display(), tz = %config.timezone, "configuration loaded");

    let history = HistoryDb::open(&config.db_path).await?;
    let aggregator = Aggregator::from_config(&config)?;

    let _scheduler =
        scheduler::start_daily_batch(&config.batch_cron, aggregator.clone(), history.clone(), config.retention_days)
            .await?;

    let state = web::Data::new(AppState {
        cache: RunCache::new(aggregator, config.cache_ttl()).with_history(history.clone()),
        history,
        retention_days: config.retention_days,
    });

    tracing::info!(bind_addr = %config.bind_addr, port = config.port, "starting bbs-tally server");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
