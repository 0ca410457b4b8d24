use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{Gateway, MarketDataStore, ResultsFilter};
use crate::error::AppError;
use crate::jobs::run_scan_job;
use crate::scanner::Scanner;
use crate::types::{RunStatus, ScanOutcome, ScanParams, ScanResult, ScanRun};

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Gateway,
    pub scan_defaults: ScanParams,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/dates", get(get_dates))
        .route("/scan", get(get_scan))
        .route("/runs", post(post_run))
        .route("/runs/:date", get(get_run))
        .route("/results", get(get_results))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ScanQuery {
    pub date: Option<String>,
    pub min_delivery: Option<f64>,
    pub vol_multiplier: Option<f64>,
    pub max_price_move: Option<f64>,
    pub lookback: Option<u32>,
}

impl ScanQuery {
    fn params(&self, defaults: ScanParams) -> ScanParams {
        ScanParams {
            min_delivery_pct: self.min_delivery.unwrap_or(defaults.min_delivery_pct),
            volume_spike_multiplier: self
                .vol_multiplier
                .unwrap_or(defaults.volume_spike_multiplier),
            max_price_move_pct: self.max_price_move.unwrap_or(defaults.max_price_move_pct),
            lookback_days: self.lookback.unwrap_or(defaults.lookback_days),
        }
    }
}

/// Flat on purpose: `serde(flatten)` loses numeric types in query strings.
#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub date: Option<String>,
    pub min_delivery: Option<f64>,
    pub max_delivery: Option<f64>,
    pub min_vol: Option<f64>,
    pub max_vol: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub has_derivatives: Option<bool>,
}

impl ResultsQuery {
    fn filter(&self) -> ResultsFilter {
        ResultsFilter {
            min_delivery: self.min_delivery,
            max_delivery: self.max_delivery,
            min_vol: self.min_vol,
            max_vol: self.max_vol,
            min_price: self.min_price,
            max_price: self.max_price,
            has_derivatives: self.has_derivatives,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub date: String,
    #[serde(default)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: impl ToString) -> Self {
        Self { status: status.to_string() }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn parse_date_param(raw: Option<&str>) -> Result<NaiveDate, AppError> {
    let raw = raw.ok_or_else(|| AppError::InvalidParams("date is required".to_string()))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidParams(format!("date must be YYYY-MM-DD, got {raw:?}")))
}

async fn get_health(State(state): State<ApiState>) -> Result<Json<StatusResponse>, AppError> {
    state.gateway.ping().await?;
    Ok(Json(StatusResponse::new("ok")))
}

async fn get_dates(State(state): State<ApiState>) -> Result<Json<Vec<NaiveDate>>, AppError> {
    Ok(Json(state.gateway.available_dates().await?))
}

async fn get_scan(
    State(state): State<ApiState>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<ScanOutcome>, AppError> {
    let date = parse_date_param(query.date.as_deref())?;
    let params = query.params(state.scan_defaults);
    params.validate()?;

    Ok(Json(Scanner::new(&state.gateway).run(date, &params).await))
}

async fn post_run(
    State(state): State<ApiState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let date = parse_date_param(Some(&req.date))?;

    if !state.gateway.claim_run(date, req.force).await? {
        let status = state
            .gateway
            .scan_run(date)
            .await?
            .map_or(RunStatus::Running, |run| run.status);
        return Ok(Json(StatusResponse::new(status)));
    }
    info!(date = %date, force = req.force, "[API] scan job queued");

    let gateway = state.gateway.clone();
    let params = state.scan_defaults;
    tokio::spawn(async move {
        // Already claimed; let the job rescan rather than reuse.
        run_scan_job(&gateway, date, &params, true).await;
    });

    Ok(Json(StatusResponse::new(RunStatus::Running)))
}

async fn get_run(
    State(state): State<ApiState>,
    Path(date): Path<String>,
) -> Result<Json<ScanRun>, AppError> {
    let date = parse_date_param(Some(&date))?;
    state
        .gateway
        .scan_run(date)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no scan run for {date}")))
}

async fn get_results(
    State(state): State<ApiState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<ScanResult>>, AppError> {
    let date = parse_date_param(query.date.as_deref())?;
    Ok(Json(state.gateway.scan_results(date, &query.filter()).await?))
}
