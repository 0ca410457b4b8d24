use chrono::NaiveDate;
use tracing::{error, info};

use crate::db::{Gateway, ResultsFilter};
use crate::error::Result;
use crate::scanner::Scanner;
use crate::types::{RunStatus, ScanOutcome, ScanParams, ScanResult};

/// Run (or reuse) the scan for one date and keep its audit trail.
///
/// A completed run is served from `scan_results` unless `force` is set.
/// Otherwise the run is marked `running`, scanned, and its results upserted
/// before it is marked `completed`. Any failure marks it `failed` with the
/// reason and comes back as a reason on the outcome.
pub async fn run_scan_job(
    gateway: &Gateway,
    date: NaiveDate,
    params: &ScanParams,
    force: bool,
) -> ScanOutcome {
    match execute(gateway, date, params, force).await {
        Ok(results) => ScanOutcome::found(date, results),
        Err(e) => {
            error!(date = %date, "[JOB] scan failed: {e}");
            if let Err(mark_err) = gateway
                .mark_run_finished(date, RunStatus::Failed, Some(&e.to_string()))
                .await
            {
                error!(date = %date, "[JOB] could not record failure: {mark_err}");
            }
            ScanOutcome::failed(date, e.to_string())
        }
    }
}

async fn execute(
    gateway: &Gateway,
    date: NaiveDate,
    params: &ScanParams,
    force: bool,
) -> Result<Vec<ScanResult>> {
    if !force {
        if let Some(run) = gateway.scan_run(date).await? {
            if run.status == RunStatus::Completed {
                info!(date = %date, "[JOB] reusing completed run");
                return gateway.scan_results(date, &ResultsFilter::default()).await;
            }
        }
    }

    gateway.mark_run_started(date).await?;
    let results = Scanner::new(gateway).scan(date, params).await?;
    gateway.upsert_scan_results(date, &results).await?;
    gateway
        .mark_run_finished(date, RunStatus::Completed, None)
        .await?;
    Ok(results)
}
