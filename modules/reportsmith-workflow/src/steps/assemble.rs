//! Assemble ordered chapter content into the final document.

use chrono::Utc;

use reportsmith_common::{AssembledReport, ChapterContent, Plan, ReportMetadata};

/// Sort chapter outputs by index and concatenate under the document title,
/// chapters separated by a horizontal rule. Metadata counts come from the
/// approved plan.
pub fn assemble(plan: &Plan, mut contents: Vec<ChapterContent>) -> AssembledReport {
    contents.sort_by_key(|c| c.chapter_index);

    let mut full_report = format!("# {}\n\n", plan.title);
    for chapter in &contents {
        full_report.push_str(&chapter.chapter_content);
        full_report.push_str("\n\n---\n\n");
    }

    AssembledReport {
        full_report,
        report_metadata: ReportMetadata {
            title: plan.title.clone(),
            chapters_count: plan.chapters.len(),
            sections_count: plan.sections_count(),
            generated_at: Utc::now(),
        },
    }
}
