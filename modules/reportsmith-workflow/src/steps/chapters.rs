//! Chapter fan-out: generate every chapter concurrently under a fixed bound.
//!
//! Completion order is irrelevant; `chapter_index` restores document order at
//! assembly. One failing chapter fails the whole fan-out and drops the
//! remaining in-flight work with the stream.

use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::info;

use reportsmith_common::{ChapterContent, ReportInput};

use crate::agent::ChapterGenerator;
use crate::state::IndexedChapter;

pub async fn generate_all(
    generator: Arc<dyn ChapterGenerator>,
    input: &ReportInput,
    chapters: &[IndexedChapter],
    concurrency: usize,
) -> Result<Vec<ChapterContent>> {
    let concurrency = concurrency.max(1);

    info!(
        report_id = %input.report_id,
        chapters = chapters.len(),
        concurrency,
        "Starting chapter fan-out"
    );

    // Give each fan-out future ownership of its inputs so it is `'static` and
    // unambiguously `Send` (borrowing `input`/`indexed` here makes the future's
    // `Send`-ness lifetime-dependent, which the async handler can't prove).
    let input = Arc::new(input.clone());
    let contents: Vec<ChapterContent> = stream::iter(chapters.iter().cloned().map(|indexed| {
        let generator = generator.clone();
        let input = input.clone();
        async move {
            generator
                .generate_chapter(&input, &indexed.chapter, indexed.chapter_index)
                .await
        }
    }))
    .buffer_unordered(concurrency)
    .try_collect()
    .await?;

    info!(
        report_id = %input.report_id,
        generated = contents.len(),
        "Chapter fan-out complete"
    );

    Ok(contents)
}
