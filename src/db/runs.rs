use chrono::NaiveDate;
use tracing::info;

use crate::db::gateway::{Gateway, NOW_SQL};
use crate::db::models::ScanRunRow;
use crate::error::Result;
use crate::types::{RunStatus, ScanRun};

impl Gateway {
    pub async fn scan_run(&self, date: NaiveDate) -> Result<Option<ScanRun>> {
        let row: Option<ScanRunRow> = sqlx::query_as(
            r#"
            SELECT run_date, status, error_message, started_at, completed_at
            FROM scan_runs
            WHERE run_date = ?
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ScanRun::from))
    }

    /// (Re)start the run for `date`, clearing any earlier error and completion time.
    pub async fn mark_run_started(&self, date: NaiveDate) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO scan_runs (run_date, status, error_message, started_at, completed_at)
            VALUES (?, 'running', NULL, {NOW_SQL}, NULL)
            ON CONFLICT(run_date) DO UPDATE SET
                status = 'running',
                error_message = NULL,
                started_at = excluded.started_at,
                completed_at = NULL
            "#
        );
        sqlx::query(&sql).bind(date).execute(&self.pool).await?;
        info!(date = %date, status = "running", "[RUN] scan started");
        Ok(())
    }

    /// Atomically mark `date` as running unless another caller owns it.
    ///
    /// Without `force` only a new or failed run is claimed. With `force` any
    /// run is claimed, including one left `running` by a crashed process.
    /// Returns whether this caller got the run.
    pub async fn claim_run(&self, date: NaiveDate, force: bool) -> Result<bool> {
        let sql = format!(
            r#"
            INSERT INTO scan_runs (run_date, status, error_message, started_at, completed_at)
            VALUES (?, 'running', NULL, {NOW_SQL}, NULL)
            ON CONFLICT(run_date) DO UPDATE SET
                status = 'running',
                error_message = NULL,
                started_at = excluded.started_at,
                completed_at = NULL
            WHERE ? OR scan_runs.status = 'failed'
            "#
        );
        let claimed = sqlx::query(&sql)
            .bind(date)
            .bind(force)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;
        if claimed {
            info!(date = %date, force, status = "running", "[RUN] scan claimed");
        }
        Ok(claimed)
    }

    /// Record a terminal status. `error` is stored only for failed runs.
    pub async fn mark_run_finished(
        &self,
        date: NaiveDate,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let error = if status == RunStatus::Failed { error } else { None };
        let sql = format!(
            r#"
            INSERT INTO scan_runs (run_date, status, error_message, started_at, completed_at)
            VALUES (?, ?, ?, {NOW_SQL}, {NOW_SQL})
            ON CONFLICT(run_date) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                completed_at = excluded.completed_at
            "#
        );
        sqlx::query(&sql)
            .bind(date)
            .bind(status.to_string())
            .bind(error)
            .execute(&self.pool)
            .await?;
        info!(date = %date, status = %status, "[RUN] scan {status}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    #[tokio::test]
    async fn run_lifecycle() {
        let gw = Gateway::in_memory().await.unwrap();
        assert!(gw.scan_run(date()).await.unwrap().is_none());

        gw.mark_run_started(date()).await.unwrap();
        let run = gw.scan_run(date()).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.completed_at.is_none());

        gw.mark_run_finished(date(), RunStatus::Failed, Some("boom")).await.unwrap();
        let run = gw.scan_run(date()).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("boom"));
        assert!(run.completed_at.is_some());

        // A restart clears the previous failure.
        gw.mark_run_started(date()).await.unwrap();
        gw.mark_run_finished(date(), RunStatus::Completed, Some("ignored")).await.unwrap();
        let run = gw.scan_run(date()).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.error_message.is_none());
    }

    #[tokio::test]
    async fn only_one_caller_claims_a_run() {
        let gw = Gateway::in_memory().await.unwrap();
        assert!(gw.claim_run(date(), false).await.unwrap());
        assert!(!gw.claim_run(date(), false).await.unwrap());

        gw.mark_run_finished(date(), RunStatus::Completed, None).await.unwrap();
        assert!(!gw.claim_run(date(), false).await.unwrap());

        gw.mark_run_finished(date(), RunStatus::Failed, Some("boom")).await.unwrap();
        assert!(gw.claim_run(date(), false).await.unwrap());
        let run = gw.scan_run(date()).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.error_message.is_none());
    }

    #[tokio::test]
    async fn forced_claim_takes_over_a_stuck_run() {
        let gw = Gateway::in_memory().await.unwrap();
        gw.mark_run_started(date()).await.unwrap();
        let before = gw.scan_run(date()).await.unwrap().unwrap().started_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(gw.claim_run(date(), true).await.unwrap());
        let after = gw.scan_run(date()).await.unwrap().unwrap();
        assert_eq!(after.status, RunStatus::Running);
        assert!(after.started_at > before);
    }
}
