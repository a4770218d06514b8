pub mod approval;
pub mod assemble;
pub mod chapters;
pub mod ingest;

pub use approval::apply_decision;
pub use assemble::assemble;
pub use chapters::generate_all;
pub use ingest::{DocumentIngestor, IngestOutput};
