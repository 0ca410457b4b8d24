use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::FeedKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaProblem {
    Missing,
    Ambiguous,
}

impl std::fmt::Display for SchemaProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaProblem::Missing => write!(f, "missing"),
            SchemaProblem::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Schema error in {feed} feed: {problem} column '{column}'")]
    Schema {
        feed: FeedKind,
        problem: SchemaProblem,
        column: &'static str,
    },

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("No data found for {0}")]
    NoData(NaiveDate),

    #[error("Insufficient history before {date} to compute the {lookback}-day average volume")]
    InsufficientHistory { date: NaiveDate, lookback: u32 },

    #[error("Ingestion failed for {failed} date(s); first failure on {first}: {reason}")]
    IngestFailed {
        failed: usize,
        first: NaiveDate,
        reason: String,
    },

    #[error("Invalid scan parameters: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn schema(feed: FeedKind, problem: SchemaProblem, column: &'static str) -> Self {
        AppError::Schema { feed, problem, column }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
