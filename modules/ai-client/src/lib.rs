//! Provider clients for the report workflow.
//!
//! `claude` handles generation: plain chat with a multi-turn tool loop, and
//! structured output coerced through a schemars-derived schema via forced tool
//! use. `openai` handles embeddings against any OpenAI-compatible endpoint.

pub mod claude;
pub mod openai;
pub mod schema;
pub mod tool;
pub mod traits;

pub use schema::StructuredOutput;
pub use tool::{Tool, ToolDefinition};
pub use traits::{EmbedAgent, Message, MessageRole};
