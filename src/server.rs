//! Read API for the dashboard.
//!
//! One route, `GET /api/news`, returning every stored record verbatim, newest
//! date first. No normalization happens on the read path.

use crate::error::AppError;
use crate::models::RawRecord;
use crate::store::NewsStore;
use axum::{Json, Router, extract::State, routing::get};
use serde_json::Value;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NewsStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/news", get(list_news))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(level = "info", skip_all, fields(%addr))]
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), Box<dyn Error>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening for news requests");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn list_news(State(state): State<AppState>) -> Result<Json<Vec<RawRecord>>, AppError> {
    let t0 = Instant::now();
    let mut records = state.store.read_all().await?;
    let fetched_ms = t0.elapsed().as_millis() as u64;

    sort_by_date_desc(&mut records);
    info!(
        count = records.len(),
        fetched_ms,
        sorted_ms = t0.elapsed().as_millis() as u64 - fetched_ms,
        "Serving news records"
    );
    Ok(Json(records))
}

/// Sort by the `date` field as a plain string, descending. Records without a
/// string date sort as if their date were empty.
pub fn sort_by_date_desc(records: &mut [RawRecord]) {
    fn date_key(record: &RawRecord) -> &str {
        record.get("date").and_then(Value::as_str).unwrap_or("")
    }
    records.sort_by(|a, b| date_key(b).cmp(date_key(a)));
}
