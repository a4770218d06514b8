//! The workflow run control surface: `start`, `resume`, `get`.
//!
//! `start` executes ingest and plan generation, then suspends at the approval
//! gate with the snapshot persisted. `resume` rehydrates the snapshot by run
//! id, applies the decision, and either fails the run (rejection) or drives
//! fan-out and assembly to completion. Step failures fail the run and are
//! reported as a failed outcome; invalid calls (unknown run, wrong lifecycle
//! state, bad input) are errors that never touch the state machine.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

pub use crate::agent::{ChapterGenerator, PlanGenerator};
use crate::mirror::StatusMirror;
use crate::run_store::RunStore;
use crate::state::{
    ApprovedPlan, ResumeDecision, RunLifecycle, RunState, StepId, APPROVAL_PROMPT,
};
use crate::steps::{self, DocumentIngestor};
use reportsmith_common::{AssembledReport, Plan, ReportInput, ReportsmithError, WorkflowStep};

pub struct WorkflowDeps {
    pub run_store: Arc<dyn RunStore>,
    pub mirror: StatusMirror,
    pub ingestor: DocumentIngestor,
    pub planner: Arc<dyn PlanGenerator>,
    pub chapters: Arc<dyn ChapterGenerator>,
    pub max_concurrent_chapters: usize,
}

#[derive(Clone)]
pub struct WorkflowService {
    deps: Arc<WorkflowDeps>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StartOutcome {
    /// Suspended at the approval gate; the caller reviews the plan and
    /// resumes with a decision.
    Suspended {
        run_id: Uuid,
        generated_plan: Plan,
        message: String,
    },
    Failed {
        run_id: Uuid,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResumeOutcome {
    Success {
        run_id: Uuid,
        report: AssembledReport,
    },
    Failed {
        run_id: Uuid,
        error: String,
    },
}

impl WorkflowService {
    pub fn new(deps: WorkflowDeps) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }

    /// Start a run: ingest, plan, suspend for approval.
    pub async fn start(&self, input: ReportInput) -> Result<StartOutcome, ReportsmithError> {
        if input.user_context.trim().is_empty() {
            return Err(ReportsmithError::Validation(
                "user_context must not be empty".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let mut state = RunState::new(run_id, input);

        info!(run_id = %run_id, report_id = %state.input.report_id, "Workflow run starting");

        self.deps
            .mirror
            .created(run_id, &state.input.report_id)
            .await;
        self.save(&state).await?;

        match self.run_to_suspension(&mut state).await {
            Ok(plan) => {
                state.lifecycle = RunLifecycle::AwaitingApproval {
                    generated_plan: plan.clone(),
                    message: APPROVAL_PROMPT.to_string(),
                };
                self.save(&state).await?;

                self.deps
                    .mirror
                    .suspended(
                        run_id,
                        serde_json::json!({
                            "generated_plan": plan,
                            "message": APPROVAL_PROMPT,
                        }),
                    )
                    .await;

                Ok(StartOutcome::Suspended {
                    run_id,
                    generated_plan: plan,
                    message: APPROVAL_PROMPT.to_string(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                error!(run_id = %run_id, error = %message, "Run failed before suspension");

                state.fail(&message);
                self.save(&state).await?;
                self.deps.mirror.failed(run_id, None, &message).await;

                Ok(StartOutcome::Failed {
                    run_id,
                    error: message,
                })
            }
        }
    }

    /// Resume a suspended run with the caller's decision. `step_id` must name
    /// the approval gate — the run's only suspension point.
    pub async fn resume(
        &self,
        run_id: Uuid,
        step_id: &str,
        decision: ResumeDecision,
    ) -> Result<ResumeOutcome, ReportsmithError> {
        if step_id != StepId::ApprovePlan.as_str() {
            return Err(ReportsmithError::Validation(format!(
                "Unknown resume step: {step_id}"
            )));
        }

        let mut state = self
            .load(run_id)
            .await?
            .ok_or_else(|| ReportsmithError::RunNotFound(run_id.to_string()))?;

        let RunLifecycle::AwaitingApproval { generated_plan, .. } = state.lifecycle.clone() else {
            return Err(ReportsmithError::InvalidResume(run_id.to_string()));
        };

        let approved = match steps::apply_decision(generated_plan, decision) {
            Ok(approved) => approved,
            Err(rejection @ ReportsmithError::Rejected(_)) => {
                let message = rejection.to_string();
                info!(run_id = %run_id, "Plan rejected by user");

                state.fail(&message);
                self.save(&state).await?;
                self.deps
                    .mirror
                    .failed(run_id, Some(WorkflowStep::PlanRejected), &message)
                    .await;

                return Ok(ResumeOutcome::Failed {
                    run_id,
                    error: message,
                });
            }
            Err(other) => return Err(other),
        };

        state.lifecycle = RunLifecycle::Running;
        state.record(StepId::ApprovePlan, &approved)?;
        self.save(&state).await?;
        self.deps
            .mirror
            .step(run_id, WorkflowStep::GenerateChaptersContent)
            .await;

        match self.run_to_completion(&mut state).await {
            Ok(report) => {
                info!(
                    run_id = %run_id,
                    chapters = report.report_metadata.chapters_count,
                    "Workflow run completed"
                );
                Ok(ResumeOutcome::Success { run_id, report })
            }
            Err(e) => {
                let message = e.to_string();
                error!(run_id = %run_id, error = %message, "Run failed after approval");

                state.fail(&message);
                self.save(&state).await?;
                self.deps.mirror.failed(run_id, None, &message).await;

                Ok(ResumeOutcome::Failed {
                    run_id,
                    error: message,
                })
            }
        }
    }

    /// Load a run's authoritative snapshot.
    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunState>, ReportsmithError> {
        self.load(run_id).await
    }

    /// Cancel a suspended run (the user abandoned the flow). Only a run
    /// waiting at the approval gate can be cancelled.
    pub async fn cancel(&self, run_id: Uuid) -> Result<(), ReportsmithError> {
        let mut state = self
            .load(run_id)
            .await?
            .ok_or_else(|| ReportsmithError::RunNotFound(run_id.to_string()))?;

        if !matches!(state.lifecycle, RunLifecycle::AwaitingApproval { .. }) {
            return Err(ReportsmithError::InvalidResume(run_id.to_string()));
        }

        const CANCELLED: &str = "Run cancelled by user";
        info!(run_id = %run_id, "Suspended run cancelled");

        state.fail(CANCELLED);
        self.save(&state).await?;
        self.deps.mirror.failed(run_id, None, CANCELLED).await;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Step sequencing
    // -----------------------------------------------------------------------

    async fn run_to_suspension(&self, state: &mut RunState) -> Result<Plan, ReportsmithError> {
        let run_id = state.run_id;

        self.deps
            .mirror
            .step(run_id, WorkflowStep::ReadingDocuments)
            .await;
        let ingested = self.deps.ingestor.run(&state.input).await?;
        state.record(StepId::IngestDocuments, &ingested)?;
        self.save(state).await?;

        self.deps
            .mirror
            .step(run_id, WorkflowStep::GeneratingChapters)
            .await;
        let plan = self
            .deps
            .planner
            .generate_plan(&state.input, ingested.ingested_text.as_deref(), run_id)
            .await
            .map_err(|e| ReportsmithError::Generation(e.to_string()))?;
        state.record(StepId::GeneratePlan, &plan)?;
        self.save(state).await?;

        self.deps
            .mirror
            .step(run_id, WorkflowStep::ChaptersGenerated)
            .await;

        Ok(plan)
    }

    async fn run_to_completion(
        &self,
        state: &mut RunState,
    ) -> Result<AssembledReport, ReportsmithError> {
        let run_id = state.run_id;

        // The effective plan lives in the approval step's slot of the result
        // map; later steps read it from there rather than re-threading it.
        let approved: ApprovedPlan = state
            .result(StepId::ApprovePlan)
            .ok_or_else(|| ReportsmithError::InvalidResume(run_id.to_string()))?;

        let contents = steps::generate_all(
            self.deps.chapters.clone(),
            &state.input,
            &approved.chapters,
            self.deps.max_concurrent_chapters,
        )
        .await
        .map_err(|e| ReportsmithError::Generation(e.to_string()))?;
        state.record(StepId::GenerateChapterContent, &contents)?;
        self.save(state).await?;

        self.deps
            .mirror
            .step(run_id, WorkflowStep::AssemblingReport)
            .await;
        let report = steps::assemble(&approved.plan, contents);
        state.record(StepId::AssembleReport, &report)?;
        state.lifecycle = RunLifecycle::Completed;
        self.save(state).await?;

        self.deps.mirror.completed(run_id).await;

        Ok(report)
    }

    async fn save(&self, state: &RunState) -> Result<(), ReportsmithError> {
        self.deps
            .run_store
            .save(state)
            .await
            .map_err(|e| ReportsmithError::Database(e.to_string()))
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunState>, ReportsmithError> {
        self.deps
            .run_store
            .load(run_id)
            .await
            .map_err(|e| ReportsmithError::Database(e.to_string()))
    }
}
