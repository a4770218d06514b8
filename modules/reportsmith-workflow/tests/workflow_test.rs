//! End-to-end workflow tests over in-memory stores and instrumented
//! generators. No network, no database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use reportsmith_common::{
    Chapter, ChapterContent, Plan, ReportInput, ReportsmithError, RunStatus, Section,
};
use reportsmith_retrieval::{InMemoryVectorStore, TextEmbedder};
use reportsmith_workflow::steps::DocumentIngestor;
use reportsmith_workflow::{
    ChapterGenerator, InMemoryRunRecordStore, InMemoryRunStore, PlanGenerator, ResumeDecision,
    ResumeOutcome, RunLifecycle, RunRecordStore, RunStore, StartOutcome, StatusMirror, StepId,
    WorkflowDeps, WorkflowService,
};

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

struct StubEmbedder;

#[async_trait]
impl TextEmbedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3])
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

struct FixedPlanner {
    plan: Plan,
}

#[async_trait]
impl PlanGenerator for FixedPlanner {
    async fn generate_plan(
        &self,
        _input: &ReportInput,
        _ingested_text: Option<&str>,
        _run_id: Uuid,
    ) -> Result<Plan> {
        Ok(self.plan.clone())
    }
}

struct FailingPlanner;

#[async_trait]
impl PlanGenerator for FailingPlanner {
    async fn generate_plan(
        &self,
        _input: &ReportInput,
        _ingested_text: Option<&str>,
        _run_id: Uuid,
    ) -> Result<Plan> {
        Err(anyhow::anyhow!("model output failed schema coercion"))
    }
}

/// Chapter generator that records invocation order and peak concurrency, and
/// finishes later chapters first so completion order inverts input order.
struct InstrumentedGenerator {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen_titles: Mutex<Vec<String>>,
    /// Per-chapter latency: (total_chapters - index) * this, so chapter 0
    /// completes last.
    inverted_latency_ms: u64,
    total_chapters: usize,
}

impl InstrumentedGenerator {
    fn new(total_chapters: usize, inverted_latency_ms: u64) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen_titles: Mutex::new(Vec::new()),
            inverted_latency_ms,
            total_chapters,
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn seen_titles(&self) -> Vec<String> {
        self.seen_titles.lock().await.clone()
    }
}

#[async_trait]
impl ChapterGenerator for InstrumentedGenerator {
    async fn generate_chapter(
        &self,
        _input: &ReportInput,
        chapter: &Chapter,
        chapter_index: usize,
    ) -> Result<ChapterContent> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        self.seen_titles.lock().await.push(chapter.title.clone());

        if self.inverted_latency_ms > 0 {
            let slots = (self.total_chapters - chapter_index) as u64;
            tokio::time::sleep(Duration::from_millis(slots * self.inverted_latency_ms)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(ChapterContent {
            chapter_index,
            title: chapter.title.clone(),
            chapter_content: format!("## {}\n\nbody of {}", chapter.title, chapter.title),
        })
    }
}

/// Fails generation for one chapter index, succeeds for the rest.
struct FaultyGenerator {
    fail_index: usize,
}

#[async_trait]
impl ChapterGenerator for FaultyGenerator {
    async fn generate_chapter(
        &self,
        _input: &ReportInput,
        chapter: &Chapter,
        chapter_index: usize,
    ) -> Result<ChapterContent> {
        if chapter_index == self.fail_index {
            return Err(anyhow::anyhow!("provider unavailable"));
        }
        Ok(ChapterContent {
            chapter_index,
            title: chapter.title.clone(),
            chapter_content: "body".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn chapter(title: &str, sections: usize) -> Chapter {
    Chapter {
        title: title.to_string(),
        description: format!("about {title}"),
        sections: (0..sections)
            .map(|i| Section {
                title: format!("{title} section {i}"),
                description: String::new(),
            })
            .collect(),
    }
}

fn plan_of(titles: &[(&str, usize)]) -> Plan {
    Plan {
        title: "Test Report".to_string(),
        chapters: titles.iter().map(|(t, n)| chapter(t, *n)).collect(),
    }
}

fn input() -> ReportInput {
    ReportInput {
        report_id: "rep-1".to_string(),
        user_context: "write a report about rust async runtimes".to_string(),
        attached_files: Vec::new(),
    }
}

struct Harness {
    service: WorkflowService,
    run_store: Arc<InMemoryRunStore>,
    records: Arc<InMemoryRunRecordStore>,
}

fn harness(
    planner: Arc<dyn PlanGenerator>,
    chapters: Arc<dyn ChapterGenerator>,
    concurrency: usize,
) -> Harness {
    let run_store = Arc::new(InMemoryRunStore::new());
    let records = Arc::new(InMemoryRunRecordStore::new());

    let service = WorkflowService::new(WorkflowDeps {
        run_store: run_store.clone(),
        mirror: StatusMirror::new(records.clone()),
        ingestor: DocumentIngestor::new(
            Arc::new(StubEmbedder),
            Arc::new(InMemoryVectorStore::new()),
        ),
        planner,
        chapters,
        max_concurrent_chapters: concurrency,
    });

    Harness {
        service,
        run_store,
        records,
    }
}

async fn start_suspended(h: &Harness) -> (Uuid, Plan) {
    match h.service.start(input()).await.unwrap() {
        StartOutcome::Suspended {
            run_id,
            generated_plan,
            ..
        } => (run_id, generated_plan),
        StartOutcome::Failed { error, .. } => panic!("start failed: {error}"),
    }
}

fn approve() -> ResumeDecision {
    ResumeDecision {
        approved: true,
        feedback: None,
        modified_plan: None,
    }
}

const APPROVAL_STEP: &str = "approve_plan";

// ---------------------------------------------------------------------------
// Start / suspend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_suspends_with_generated_plan() {
    let plan = plan_of(&[("Intro", 1), ("Depth", 2)]);
    let h = harness(
        Arc::new(FixedPlanner { plan: plan.clone() }),
        Arc::new(InstrumentedGenerator::new(2, 0)),
        10,
    );

    let (run_id, generated) = start_suspended(&h).await;
    assert_eq!(generated, plan);

    // The authoritative snapshot is suspended and rehydratable
    let state = h.run_store.load(run_id).await.unwrap().unwrap();
    assert!(matches!(
        state.lifecycle,
        RunLifecycle::AwaitingApproval { .. }
    ));
    assert_eq!(state.result::<Plan>(StepId::GeneratePlan).unwrap(), plan);

    // The mirror saw the suspension
    let record = h.records.get_run_record(run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Suspended);
    assert_eq!(record.current_step.as_deref(), Some("awaiting_approval"));
    assert!(record.suspended_payload.is_some());
}

#[tokio::test]
async fn empty_user_context_never_creates_a_run() {
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1)]),
        }),
        Arc::new(InstrumentedGenerator::new(1, 0)),
        10,
    );

    let result = h
        .service
        .start(ReportInput {
            report_id: "rep-1".to_string(),
            user_context: "   ".to_string(),
            attached_files: Vec::new(),
        })
        .await;

    assert!(matches!(result, Err(ReportsmithError::Validation(_))));
}

#[tokio::test]
async fn plan_generation_failure_fails_the_run() {
    let h = harness(
        Arc::new(FailingPlanner),
        Arc::new(InstrumentedGenerator::new(1, 0)),
        10,
    );

    let outcome = h.service.start(input()).await.unwrap();
    let StartOutcome::Failed { run_id, error } = outcome else {
        panic!("expected failure");
    };
    assert!(error.contains("schema coercion"));

    let state = h.run_store.load(run_id).await.unwrap().unwrap();
    assert!(matches!(state.lifecycle, RunLifecycle::Failed { .. }));

    let record = h.records.get_run_record(run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert!(record.error_message.unwrap().contains("schema coercion"));
}

// ---------------------------------------------------------------------------
// Order preservation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chapters_assemble_in_plan_order_despite_completion_order() {
    let titles = ["First", "Second", "Third", "Fourth", "Fifth", "Sixth"];
    let plan = plan_of(&titles.iter().map(|t| (*t, 1)).collect::<Vec<_>>());
    // Later chapters finish first: chapter 0 sleeps longest
    let generator = Arc::new(InstrumentedGenerator::new(titles.len(), 15));
    let h = harness(Arc::new(FixedPlanner { plan }), generator, titles.len());

    let (run_id, _) = start_suspended(&h).await;
    let outcome = h
        .service
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();

    let ResumeOutcome::Success { report, .. } = outcome else {
        panic!("expected success");
    };

    let positions: Vec<usize> = titles
        .iter()
        .map(|t| report.full_report.find(&format!("## {t}")).unwrap())
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "chapters out of order: {positions:?}"
    );
}

// ---------------------------------------------------------------------------
// Approval substitution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn modified_plan_feeds_fan_out_not_the_generated_one() {
    let generated = plan_of(&[("Alpha", 1), ("Beta", 1)]);
    let generator = Arc::new(InstrumentedGenerator::new(2, 0));
    let h = harness(
        Arc::new(FixedPlanner { plan: generated }),
        generator.clone(),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;

    // Swapped order and a renamed chapter
    let modified = plan_of(&[("Beta", 1), ("Gamma", 2)]);
    let outcome = h
        .service
        .resume(
            run_id,
            APPROVAL_STEP,
            ResumeDecision {
                approved: true,
                feedback: None,
                modified_plan: Some(modified),
            },
        )
        .await
        .unwrap();

    let ResumeOutcome::Success { report, .. } = outcome else {
        panic!("expected success");
    };

    let mut seen = generator.seen_titles().await;
    seen.sort();
    assert_eq!(seen, vec!["Beta".to_string(), "Gamma".to_string()]);

    // Document order and metadata follow the modified plan
    assert!(report.full_report.find("## Beta").unwrap() < report.full_report.find("## Gamma").unwrap());
    assert_eq!(report.report_metadata.chapters_count, 2);
    assert_eq!(report.report_metadata.sections_count, 3);
}

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejection_halts_progress_and_carries_feedback() {
    let generator = Arc::new(InstrumentedGenerator::new(2, 0));
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1), ("B", 1)]),
        }),
        generator.clone(),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    let outcome = h
        .service
        .resume(
            run_id,
            APPROVAL_STEP,
            ResumeDecision {
                approved: false,
                feedback: Some("needs more detail".to_string()),
                modified_plan: None,
            },
        )
        .await
        .unwrap();

    let ResumeOutcome::Failed { error, .. } = outcome else {
        panic!("expected failure");
    };
    assert!(error.contains("needs more detail"));

    // No chapter generation ran
    assert!(generator.seen_titles().await.is_empty());

    let state = h.run_store.load(run_id).await.unwrap().unwrap();
    let RunLifecycle::Failed { error } = state.lifecycle else {
        panic!("run should be failed");
    };
    assert!(error.contains("needs more detail"));

    let record = h.records.get_run_record(run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.current_step.as_deref(), Some("plan_rejected"));
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metadata_counts_match_the_approved_plan() {
    let plan = plan_of(&[("A", 2), ("B", 3), ("C", 1)]);
    let h = harness(
        Arc::new(FixedPlanner { plan }),
        Arc::new(InstrumentedGenerator::new(3, 0)),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    let outcome = h
        .service
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();

    let ResumeOutcome::Success { report, .. } = outcome else {
        panic!("expected success");
    };
    assert_eq!(report.report_metadata.title, "Test Report");
    assert_eq!(report.report_metadata.chapters_count, 3);
    assert_eq!(report.report_metadata.sections_count, 6);
}

// ---------------------------------------------------------------------------
// Idempotent resume guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_resume_is_a_deterministic_error() {
    let generator = Arc::new(InstrumentedGenerator::new(1, 0));
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("Only", 1)]),
        }),
        generator.clone(),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    let first = h
        .service
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();
    assert!(matches!(first, ResumeOutcome::Success { .. }));

    let second = h.service.resume(run_id, APPROVAL_STEP, approve()).await;
    assert!(matches!(second, Err(ReportsmithError::InvalidResume(_))));

    // Fan-out did not run twice
    assert_eq!(generator.seen_titles().await.len(), 1);
}

#[tokio::test]
async fn cancelled_run_cannot_be_resumed() {
    let generator = Arc::new(InstrumentedGenerator::new(1, 0));
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1)]),
        }),
        generator.clone(),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    h.service.cancel(run_id).await.unwrap();

    let state = h.run_store.load(run_id).await.unwrap().unwrap();
    let RunLifecycle::Failed { error } = state.lifecycle else {
        panic!("cancelled run should be failed");
    };
    assert!(error.contains("cancelled"));

    let resumed = h.service.resume(run_id, APPROVAL_STEP, approve()).await;
    assert!(matches!(resumed, Err(ReportsmithError::InvalidResume(_))));
    assert!(generator.seen_titles().await.is_empty());
}

#[tokio::test]
async fn only_suspended_runs_can_be_cancelled() {
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1)]),
        }),
        Arc::new(InstrumentedGenerator::new(1, 0)),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    let outcome = h
        .service
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();
    assert!(matches!(outcome, ResumeOutcome::Success { .. }));

    let result = h.service.cancel(run_id).await;
    assert!(matches!(result, Err(ReportsmithError::InvalidResume(_))));
}

#[tokio::test]
async fn resume_of_unknown_run_is_not_found() {
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1)]),
        }),
        Arc::new(InstrumentedGenerator::new(1, 0)),
        10,
    );

    let result = h.service.resume(Uuid::new_v4(), APPROVAL_STEP, approve()).await;
    assert!(matches!(result, Err(ReportsmithError::RunNotFound(_))));
}

#[tokio::test]
async fn resume_with_wrong_step_id_is_rejected() {
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1)]),
        }),
        Arc::new(InstrumentedGenerator::new(1, 0)),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    let result = h.service.resume(run_id, "assemble_report", approve()).await;
    assert!(matches!(result, Err(ReportsmithError::Validation(_))));
}

// ---------------------------------------------------------------------------
// Concurrency bound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fan_out_respects_the_concurrency_bound() {
    let titles: Vec<(String, usize)> = (0..12).map(|i| (format!("Ch{i}"), 1)).collect();
    let plan = Plan {
        title: "Bounded".to_string(),
        chapters: titles.iter().map(|(t, n)| chapter(t, *n)).collect(),
    };

    let generator = Arc::new(InstrumentedGenerator::new(12, 5));
    let h = harness(Arc::new(FixedPlanner { plan }), generator.clone(), 3);

    let (run_id, _) = start_suspended(&h).await;
    let outcome = h
        .service
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();
    assert!(matches!(outcome, ResumeOutcome::Success { .. }));

    assert!(
        generator.peak() <= 3,
        "peak in-flight {} exceeded bound 3",
        generator.peak()
    );
    assert_eq!(generator.seen_titles().await.len(), 12);
}

// ---------------------------------------------------------------------------
// Per-chapter failure policy: fail-fast
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failing_chapter_fails_the_run() {
    let h = harness(
        Arc::new(FixedPlanner {
            plan: plan_of(&[("A", 1), ("B", 1), ("C", 1)]),
        }),
        Arc::new(FaultyGenerator { fail_index: 1 }),
        10,
    );

    let (run_id, _) = start_suspended(&h).await;
    let outcome = h
        .service
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();

    let ResumeOutcome::Failed { error, .. } = outcome else {
        panic!("expected failure");
    };
    assert!(error.contains("provider unavailable"));

    let state = h.run_store.load(run_id).await.unwrap().unwrap();
    assert!(matches!(state.lifecycle, RunLifecycle::Failed { .. }));
}

// ---------------------------------------------------------------------------
// Resume across service instances (process-restart shape)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resume_works_from_a_fresh_service_over_the_same_store() {
    let run_store = Arc::new(InMemoryRunStore::new());
    let records = Arc::new(InMemoryRunRecordStore::new());
    let plan = plan_of(&[("Solo", 2)]);

    let build = |planner: Arc<dyn PlanGenerator>| {
        WorkflowService::new(WorkflowDeps {
            run_store: run_store.clone(),
            mirror: StatusMirror::new(records.clone()),
            ingestor: DocumentIngestor::new(
                Arc::new(StubEmbedder),
                Arc::new(InMemoryVectorStore::new()),
            ),
            planner,
            chapters: Arc::new(InstrumentedGenerator::new(1, 0)),
            max_concurrent_chapters: 10,
        })
    };

    let first = build(Arc::new(FixedPlanner { plan: plan.clone() }));
    let StartOutcome::Suspended { run_id, .. } = first.start(input()).await.unwrap() else {
        panic!("expected suspension");
    };
    drop(first);

    // A new service instance sees only the persisted snapshot
    let second = build(Arc::new(FailingPlanner));
    let outcome = second
        .resume(run_id, APPROVAL_STEP, approve())
        .await
        .unwrap();

    let ResumeOutcome::Success { report, .. } = outcome else {
        panic!("expected success after rehydration");
    };
    assert_eq!(report.report_metadata.chapters_count, 1);
    assert_eq!(report.report_metadata.sections_count, 2);
}
