//! The approval gate's decision logic.
//!
//! The effective plan is exactly one of {generated, user-modified} — never a
//! merge. Chapter indexes are assigned by position in whichever plan was
//! chosen.

use reportsmith_common::ReportsmithError;

use crate::state::{ApprovedPlan, IndexedChapter, ResumeDecision};
use reportsmith_common::Plan;

const DEFAULT_REJECTION_FEEDBACK: &str = "No feedback provided";

/// Apply a resume decision to the suspended plan.
///
/// Approval yields the effective plan with its ordered `(chapter, index)`
/// pairs for the fan-out. Rejection is the expected terminal outcome, returned
/// as `ReportsmithError::Rejected` carrying the feedback verbatim.
pub fn apply_decision(
    generated_plan: Plan,
    decision: ResumeDecision,
) -> Result<ApprovedPlan, ReportsmithError> {
    if !decision.approved {
        let feedback = decision
            .feedback
            .unwrap_or_else(|| DEFAULT_REJECTION_FEEDBACK.to_string());
        return Err(ReportsmithError::Rejected(feedback));
    }

    let plan = decision.modified_plan.unwrap_or(generated_plan);

    if plan.chapters.is_empty() {
        return Err(ReportsmithError::Validation(
            "Approved plan has no chapters".to_string(),
        ));
    }

    let chapters = plan
        .chapters
        .iter()
        .enumerate()
        .map(|(chapter_index, chapter)| IndexedChapter {
            chapter: chapter.clone(),
            chapter_index,
        })
        .collect();

    Ok(ApprovedPlan { plan, chapters })
}
