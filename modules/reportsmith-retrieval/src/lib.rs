//! Retrieval layer: the vector store adapter, document chunking and text
//! extraction for ingestion, the embedding seam, and the LLM re-ranker.

pub mod chunker;
pub mod embedder;
pub mod extract;
pub mod rerank;
pub mod store;
pub mod upstash;

pub use chunker::{chunk_text, CHUNK_OVERLAP, CHUNK_SIZE};
pub use embedder::{Embedder, TextEmbedder};
pub use extract::extract_attachments;
pub use rerank::{LlmReranker, Reranker};
pub use store::{InMemoryVectorStore, QueryMatch, RecordMetadata, VectorRecord, VectorStore};
pub use upstash::UpstashVectorStore;

/// Vector index namespace for a report. All ingestion and retrieval for one
/// report happens under this namespace; retrieval never crosses reports.
pub fn report_namespace(report_id: &str) -> String {
    format!("report-{report_id}")
}
