use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::HoldingsError;
use crate::ingest::IngestDriver;
use crate::models::{CoverageSummary, HoldingRecord};

pub struct AppState {
    pub driver: IngestDriver,
}

/// Fixed success envelope of the metadata endpoint
#[derive(Debug, Serialize)]
pub struct MetadataEnvelope {
    pub status_code: u16,
    pub msg: String,
    pub data: CoverageSummary,
}

impl MetadataEnvelope {
    pub fn success(data: CoverageSummary) -> Self {
        Self {
            status_code: 200,
            msg: "Success".to_string(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestForm {
    pub start_date: String,
    pub end_date: Option<String>,
    pub exchange: String,
}

/// Listing view: every stored row
async fn list_holdings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HoldingRecord>>, ApiError> {
    let holdings = state.driver.store().list_all().await?;
    Ok(Json(holdings))
}

/// Metadata query: distinct exchanges plus covered date interval
async fn exchange_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetadataEnvelope>, ApiError> {
    let coverage = state.driver.store().coverage().await?;
    Ok(Json(MetadataEnvelope::success(coverage)))
}

/// Form-triggered ingestion; redirects back to the listing on success
async fn trigger_ingest(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IngestForm>,
) -> Result<Redirect, ApiError> {
    let report = state
        .driver
        .ingest_range_str(&form.exchange, &form.start_date, form.end_date.as_deref())
        .await?;
    info!(
        "Web-triggered ingest for {} done: {} records over {} days",
        form.exchange, report.records_inserted, report.days_visited
    );
    Ok(Redirect::to("/"))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_holdings).post(trigger_ingest))
        .route("/api/exchange", get(exchange_metadata))
        .with_state(state)
}

/// Run the HTTP server until shutdown
pub async fn serve(state: Arc<AppState>, bind_address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Listening on http://{}", bind_address);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Maps domain errors to 400 and everything else to 500 with a JSON body
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<HoldingsError>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {:#}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(serde_json::json!({
            "status_code": status.as_u16(),
            "msg": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
