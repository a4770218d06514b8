//! Run state: an explicit, serializable snapshot of one workflow execution.
//!
//! The snapshot — init input, append-only step-result map, lifecycle — is
//! everything resumption needs. No in-memory continuation survives a suspend.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reportsmith_common::{Chapter, Plan, ReportInput, RunStatus};

/// The prompt shown to the user while the run waits at the approval gate.
pub const APPROVAL_PROMPT: &str =
    "Please review and approve the generated report chapters before proceeding.";

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Identifies a step's slot in the run's result map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    IngestDocuments,
    GeneratePlan,
    ApprovePlan,
    GenerateChapterContent,
    AssembleReport,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::IngestDocuments => "ingest_documents",
            StepId::GeneratePlan => "generate_plan",
            StepId::ApprovePlan => "approve_plan",
            StepId::GenerateChapterContent => "generate_chapter_content",
            StepId::AssembleReport => "assemble_report",
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Where the run is in its life.
///
/// ```text
/// Running → AwaitingApproval → Running → Completed
///                            ↘ Failed (rejection or error)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunLifecycle {
    /// Executing steps.
    Running,
    /// Suspended at the approval gate; the generated plan and prompt message
    /// are the suspend payload.
    AwaitingApproval { generated_plan: Plan, message: String },
    /// Report assembled.
    Completed,
    /// Terminal failure — a step error or a plan rejection.
    Failed { error: String },
}

impl RunLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

// ---------------------------------------------------------------------------
// Resume decision
// ---------------------------------------------------------------------------

/// The externally supplied decision that resumes a suspended run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeDecision {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Option<String>,
    /// Full replacement plan. Never merged with the generated one.
    #[serde(default)]
    pub modified_plan: Option<Plan>,
}

/// A chapter paired with its position in the approved plan. The index is
/// carried through the fan-out untouched and restores order at assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChapter {
    pub chapter: Chapter,
    pub chapter_index: usize,
}

/// Outcome of an approval: the effective plan and its indexed chapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedPlan {
    pub plan: Plan,
    pub chapters: Vec<IndexedChapter>,
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// One run's durable snapshot. Persisted at every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub input: ReportInput,
    pub lifecycle: RunLifecycle,
    /// Append-only, step-id-keyed result map. Any later step may read any
    /// earlier step's slot; no step writes another step's slot.
    step_results: BTreeMap<StepId, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(run_id: Uuid, input: ReportInput) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            input,
            lifecycle: RunLifecycle::Running,
            step_results: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a step's output. Each slot is written exactly once.
    pub fn record<T: Serialize>(&mut self, step: StepId, value: &T) -> Result<()> {
        if self.step_results.contains_key(&step) {
            return Err(anyhow!("Step result already recorded: {}", step.as_str()));
        }
        self.step_results
            .insert(step, serde_json::to_value(value)?);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Read back an earlier step's output.
    pub fn result<T: DeserializeOwned>(&self, step: StepId) -> Option<T> {
        self.step_results
            .get(&step)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.lifecycle = RunLifecycle::Failed {
            error: error.into(),
        };
        self.updated_at = Utc::now();
    }

    /// The coarse status mirrored to the record store.
    pub fn status(&self) -> RunStatus {
        match &self.lifecycle {
            RunLifecycle::Running => RunStatus::Running,
            RunLifecycle::AwaitingApproval { .. } => RunStatus::Suspended,
            RunLifecycle::Completed => RunStatus::Completed,
            RunLifecycle::Failed { .. } => RunStatus::Failed,
        }
    }
}
