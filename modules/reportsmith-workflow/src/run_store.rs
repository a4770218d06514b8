//! Durable run snapshots. The single source of truth for resume.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::RunState;

/// Snapshot store. `save` is called at every lifecycle transition and after
/// every recorded step result; `load` rehydrates a run for resumption.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(&self, state: &RunState) -> Result<()>;
    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<Uuid, RunState>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, state: &RunState) -> Result<()> {
        self.runs.write().await.insert(state.run_id, state.clone());
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// Postgres-backed snapshot store. The whole `RunState` is stored as one JSONB
/// column; status is denormalized for querying.
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_runs (
                run_id      UUID         PRIMARY KEY,
                report_id   TEXT         NOT NULL,
                status      TEXT         NOT NULL,
                snapshot    JSONB        NOT NULL,
                created_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
                updated_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn save(&self, state: &RunState) -> Result<()> {
        let snapshot = serde_json::to_value(state)?;

        sqlx::query(
            r#"
            INSERT INTO workflow_runs (run_id, report_id, status, snapshot, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (run_id)
            DO UPDATE SET status = $3, snapshot = $4, updated_at = now()
            "#,
        )
        .bind(state.run_id)
        .bind(&state.input.report_id)
        .bind(state.status().to_string())
        .bind(&snapshot)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT snapshot FROM workflow_runs WHERE run_id = $1")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((snapshot,)) => Ok(Some(serde_json::from_value(snapshot)?)),
            None => Ok(None),
        }
    }
}
