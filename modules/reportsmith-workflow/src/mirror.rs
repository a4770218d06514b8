//! Best-effort status mirror for UI polling.
//!
//! The record store holds an eventually-consistent copy of run status and
//! current step. It is never authoritative: every write goes through
//! `StatusMirror`, which logs failures and swallows them, and nothing in the
//! workflow reads it back to make control decisions.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use reportsmith_common::{RunStatus, WorkflowStep};

// ---------------------------------------------------------------------------
// RunRecordStore
// ---------------------------------------------------------------------------

/// The mirrored view of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub report_id: String,
    pub status: RunStatus,
    pub current_step: Option<String>,
    pub suspended_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RunRecordStore: Send + Sync {
    async fn create_run_record(&self, run_id: Uuid, report_id: &str) -> Result<()>;

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        current_step: Option<&str>,
        suspended_payload: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<()>;

    async fn get_run_record(&self, run_id: Uuid) -> Result<Option<RunRecord>>;
}

// ---------------------------------------------------------------------------
// StatusMirror — the fire-and-forget wrapper
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StatusMirror {
    store: Arc<dyn RunRecordStore>,
}

impl StatusMirror {
    pub fn new(store: Arc<dyn RunRecordStore>) -> Self {
        Self { store }
    }

    /// Direct read access for the polling surface. Not used by the workflow.
    pub fn store(&self) -> &Arc<dyn RunRecordStore> {
        &self.store
    }

    pub async fn created(&self, run_id: Uuid, report_id: &str) {
        if let Err(e) = self.store.create_run_record(run_id, report_id).await {
            warn!(run_id = %run_id, error = %e, "Failed to create run record, continuing");
        }
    }

    pub async fn step(&self, run_id: Uuid, step: WorkflowStep) {
        self.update(run_id, RunStatus::Running, Some(step), None, None)
            .await;
    }

    pub async fn suspended(&self, run_id: Uuid, payload: serde_json::Value) {
        self.update(
            run_id,
            RunStatus::Suspended,
            Some(WorkflowStep::AwaitingApproval),
            Some(payload),
            None,
        )
        .await;
    }

    pub async fn completed(&self, run_id: Uuid) {
        self.update(
            run_id,
            RunStatus::Completed,
            Some(WorkflowStep::ReportCompleted),
            None,
            None,
        )
        .await;
    }

    pub async fn failed(&self, run_id: Uuid, step: Option<WorkflowStep>, error: &str) {
        self.update(run_id, RunStatus::Failed, step, None, Some(error))
            .await;
    }

    async fn update(
        &self,
        run_id: Uuid,
        status: RunStatus,
        step: Option<WorkflowStep>,
        payload: Option<serde_json::Value>,
        error: Option<&str>,
    ) {
        let current_step = step.map(|s| s.as_str());
        if let Err(e) = self
            .store
            .update_run_status(run_id, status, current_step, payload, error)
            .await
        {
            warn!(run_id = %run_id, %status, error = %e, "Failed to mirror run status, continuing");
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRunRecordStore {
    records: RwLock<HashMap<Uuid, RunRecord>>,
}

impl InMemoryRunRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRecordStore for InMemoryRunRecordStore {
    async fn create_run_record(&self, run_id: Uuid, report_id: &str) -> Result<()> {
        self.records.write().await.insert(
            run_id,
            RunRecord {
                run_id,
                report_id: report_id.to_string(),
                status: RunStatus::Pending,
                current_step: None,
                suspended_payload: None,
                error_message: None,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        current_step: Option<&str>,
        suspended_payload: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&run_id) {
            record.status = status;
            if let Some(step) = current_step {
                record.current_step = Some(step.to_string());
            }
            if suspended_payload.is_some() {
                record.suspended_payload = suspended_payload;
            }
            if let Some(error) = error_message {
                record.error_message = Some(error.to_string());
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_run_record(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        Ok(self.records.read().await.get(&run_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgRunRecordStore {
    pool: PgPool,
}

impl PgRunRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_records (
                run_id             UUID         PRIMARY KEY,
                report_id          TEXT         NOT NULL,
                status             TEXT         NOT NULL,
                current_step       TEXT,
                suspended_payload  JSONB,
                error_message      TEXT,
                updated_at         TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RunRecordStore for PgRunRecordStore {
    async fn create_run_record(&self, run_id: Uuid, report_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO run_records (run_id, report_id, status)
            VALUES ($1, $2, 'pending')
            ON CONFLICT (run_id) DO NOTHING
            "#,
        )
        .bind(run_id)
        .bind(report_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        current_step: Option<&str>,
        suspended_payload: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE run_records
            SET status = $2,
                current_step = COALESCE($3, current_step),
                suspended_payload = COALESCE($4, suspended_payload),
                error_message = COALESCE($5, error_message),
                updated_at = now()
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(status.to_string())
        .bind(current_step)
        .bind(suspended_payload)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run_record(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let row: Option<(
            Uuid,
            String,
            String,
            Option<String>,
            Option<serde_json::Value>,
            Option<String>,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT run_id, report_id, status, current_step, suspended_payload, error_message, updated_at
            FROM run_records
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(run_id, report_id, status, current_step, suspended_payload, error_message, updated_at)| {
                RunRecord {
                    run_id,
                    report_id,
                    status: parse_status(&status),
                    current_step,
                    suspended_payload,
                    error_message,
                    updated_at,
                }
            },
        ))
    }
}

fn parse_status(s: &str) -> RunStatus {
    match s {
        "running" => RunStatus::Running,
        "suspended" => RunStatus::Suspended,
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A store that always fails, to prove mirror writes never propagate.
    struct FailingStore;

    #[async_trait]
    impl RunRecordStore for FailingStore {
        async fn create_run_record(&self, _: Uuid, _: &str) -> Result<()> {
            Err(anyhow::anyhow!("record store down"))
        }

        async fn update_run_status(
            &self,
            _: Uuid,
            _: RunStatus,
            _: Option<&str>,
            _: Option<serde_json::Value>,
            _: Option<&str>,
        ) -> Result<()> {
            Err(anyhow::anyhow!("record store down"))
        }

        async fn get_run_record(&self, _: Uuid) -> Result<Option<RunRecord>> {
            Err(anyhow::anyhow!("record store down"))
        }
    }

    #[tokio::test]
    async fn mirror_swallows_store_failures() {
        let mirror = StatusMirror::new(Arc::new(FailingStore));
        let run_id = Uuid::new_v4();

        // None of these may panic or propagate
        mirror.created(run_id, "rep-1").await;
        mirror.step(run_id, WorkflowStep::GeneratingChapters).await;
        mirror.suspended(run_id, serde_json::json!({})).await;
        mirror
            .failed(run_id, Some(WorkflowStep::PlanRejected), "nope")
            .await;
        mirror.completed(run_id).await;
    }

    #[tokio::test]
    async fn record_tracks_progress() {
        let store = Arc::new(InMemoryRunRecordStore::new());
        let mirror = StatusMirror::new(store.clone());
        let run_id = Uuid::new_v4();

        mirror.created(run_id, "rep-1").await;
        mirror.step(run_id, WorkflowStep::GeneratingChapters).await;

        let record = store.get_run_record(run_id).await.unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Running);
        assert_eq!(record.current_step.as_deref(), Some("generating_chapters"));

        mirror.suspended(run_id, serde_json::json!({"plan": "p"})).await;
        let record = store.get_run_record(run_id).await.unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Suspended);
        assert!(record.suspended_payload.is_some());
    }

    #[tokio::test]
    async fn failure_records_error_message() {
        let store = Arc::new(InMemoryRunRecordStore::new());
        let mirror = StatusMirror::new(store.clone());
        let run_id = Uuid::new_v4();

        mirror.created(run_id, "rep-1").await;
        mirror
            .failed(run_id, Some(WorkflowStep::PlanRejected), "needs more detail")
            .await;

        let record = store.get_run_record(run_id).await.unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("needs more detail"));
        assert_eq!(record.current_step.as_deref(), Some("plan_rejected"));
    }
}
