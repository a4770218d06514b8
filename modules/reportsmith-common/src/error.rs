use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportsmithError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("User rejected the report plan: {0}")]
    Rejected(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run is not awaiting approval: {0}")]
    InvalidResume(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
