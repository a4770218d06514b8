//! Document ingestion: extract attachment text, chunk, embed, upsert into the
//! report's vector namespace.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use reportsmith_common::ReportInput;
use reportsmith_retrieval::{
    chunk_text, extract_attachments, report_namespace, RecordMetadata, TextEmbedder, VectorRecord,
    VectorStore, CHUNK_OVERLAP, CHUNK_SIZE,
};

/// Output of the ingest step: the raw concatenated attachment text, used
/// directly by plan generation. `None` marks "no supplementary context".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    pub ingested_text: Option<String>,
}

pub struct DocumentIngestor {
    embedder: Arc<dyn TextEmbedder>,
    vectors: Arc<dyn VectorStore>,
}

impl DocumentIngestor {
    pub fn new(embedder: Arc<dyn TextEmbedder>, vectors: Arc<dyn VectorStore>) -> Self {
        Self { embedder, vectors }
    }

    pub async fn run(&self, input: &ReportInput) -> Result<IngestOutput> {
        if input.attached_files.is_empty() {
            return Ok(IngestOutput {
                ingested_text: None,
            });
        }

        let text = extract_attachments(&input.attached_files);
        if text.trim().is_empty() {
            return Ok(IngestOutput {
                ingested_text: None,
            });
        }

        let chunks = chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        let embeddings = self.embedder.embed_batch(chunks.clone()).await?;

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, vector))| VectorRecord {
                id: format!("{}-{i}", input.report_id),
                vector,
                metadata: RecordMetadata {
                    text: chunk,
                    report_id: input.report_id.clone(),
                },
            })
            .collect();

        let count = records.len();
        self.vectors
            .upsert(&report_namespace(&input.report_id), records)
            .await?;

        info!(
            report_id = %input.report_id,
            files = input.attached_files.len(),
            chunks = count,
            "Attachments ingested into vector store"
        );

        Ok(IngestOutput {
            ingested_text: Some(text),
        })
    }
}
