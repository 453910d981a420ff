//! HTTP handler functions for the bbs-tally API.

use actix_web::error::QueryPayloadError;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tally_client::{Aggregator, RunCache, run_daily_batch};
use tally_core::{Error, HistoryDb};

use crate::error::ApiError;

/// Shared application state.
pub struct AppState {
    /// Last aggregation run, refreshed on demand.
    pub cache: RunCache,
    /// Daily history of healthy sites.
    pub history: HistoryDb,
    /// Rows older than this many days are purged after each batch.
    pub retention_days: u32,
}

impl AppState {
    fn aggregator(&self) -> &Aggregator {
        self.cache.aggregator()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiHealth {
    pub healthy: bool,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

/// Malformed query strings answer like any other request error.
fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::from(Error::InvalidInput(err.to_string())).into()
}

/// Mount every route under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::QueryConfig::default().error_handler(query_error))
            .route("/health", web::get().to(health))
            .route("/posts", web::get().to(posts))
            .route("/refresh", web::get().to(refresh))
            .route("/comparison", web::get().to(comparison))
            .route("/history/{site_id}", web::get().to(history))
            .route("/batch/run", web::get().to(batch_run)),
    );
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth { healthy: true, version: env!("CARGO_PKG_VERSION").to_string() })
}

/// `GET /api/posts`
///
/// Serves the cached run, aggregating first if it is missing or stale.
pub async fn posts(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.cache.get_or_refresh(false).await)
}

/// `GET /api/refresh`
pub async fn refresh(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.cache.get_or_refresh(true).await)
}

/// `GET /api/comparison`
///
/// Today against yesterday and against the same weekday last week, for
/// every site with a row today.
pub async fn comparison(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let today = state.aggregator().today();
    let comparisons = state.history.all_comparisons(today).await?;
    Ok(HttpResponse::Ok().json(comparisons))
}

/// `GET /api/history/{site_id}?days=N`
///
/// The site's last `N` stored days, most recent first.
pub async fn history(
    state: web::Data<AppState>, path: web::Path<String>, query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    if query.days == 0 {
        return Err(Error::InvalidInput("days must be at least 1".into()).into());
    }
    let records = state.history.list_recent(&path, query.days).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// `GET /api/batch/run`
///
/// Runs the daily job immediately for today. The job runs on its own task
/// so a dropped connection cannot stop it halfway through persisting.
pub async fn batch_run(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let aggregator = state.aggregator().clone();
    let history = state.history.clone();
    let retention_days = state.retention_days;
    let today = aggregator.today();
    tracing::info!(date = %today, "manual batch run requested");

    let report = tokio::spawn(async move { run_daily_batch(&aggregator, &history, today, retention_days).await })
        .await
        .map_err(|e| ApiError::Batch(e.to_string()))?;
    Ok(HttpResponse::Ok().json(report))
}
