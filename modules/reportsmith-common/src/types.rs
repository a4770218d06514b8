use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A single descriptive section within a chapter. Guidance for the generator,
/// never generated independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    pub title: String,
    pub description: String,
}

/// One chapter of the planned report. The unit of the generation fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Chapter {
    pub title: String,
    /// Used as generation guidance and as part of the retrieval query.
    pub description: String,
    pub sections: Vec<Section>,
}

/// The proposed or approved structure of the report. Chapter order is
/// significant: it fixes `chapter_index` and the final document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    pub title: String,
    pub chapters: Vec<Chapter>,
}

impl Plan {
    /// Total section count across all chapters.
    pub fn sections_count(&self) -> usize {
        self.chapters.iter().map(|c| c.sections.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Run input
// ---------------------------------------------------------------------------

/// An uploaded file carried with the initial request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedFile {
    pub filename: String,
    /// MIME type, used to dispatch to the right text extractor.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The initial input of a run. Flows unchanged to every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    pub report_id: String,
    pub user_context: String,
    #[serde(default)]
    pub attached_files: Vec<AttachedFile>,
}

// ---------------------------------------------------------------------------
// Generated output
// ---------------------------------------------------------------------------

/// Output of the content generator for one chapter. Unordered until assembly
/// sorts by `chapter_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterContent {
    pub chapter_index: usize,
    pub title: String,
    pub chapter_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub title: String,
    pub chapters_count: usize,
    pub sections_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledReport {
    pub full_report: String,
    pub report_metadata: ReportMetadata,
}

// ---------------------------------------------------------------------------
// Run status mirror vocabulary
// ---------------------------------------------------------------------------

/// Coarse run status mirrored to the record store for UI polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Suspended => "suspended",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Progress labels mirrored alongside the status. Observability only: the
/// workflow never reads these back to make decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    ReadingDocuments,
    GeneratingChapters,
    ChaptersGenerated,
    AwaitingApproval,
    GenerateChaptersContent,
    PlanRejected,
    AssemblingReport,
    ReportCompleted,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::ReadingDocuments => "reading_documents",
            WorkflowStep::GeneratingChapters => "generating_chapters",
            WorkflowStep::ChaptersGenerated => "chapters_generated",
            WorkflowStep::AwaitingApproval => "awaiting_approval",
            WorkflowStep::GenerateChaptersContent => "generate_chapters_content",
            WorkflowStep::PlanRejected => "plan_rejected",
            WorkflowStep::AssemblingReport => "assembling_report",
            WorkflowStep::ReportCompleted => "report_completed",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
