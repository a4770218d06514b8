use anyhow::Result;
use async_trait::async_trait;

/// Wire-level tool description sent to the model.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

/// An object-safe tool the model may call during a multi-turn generation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Execute with the model-supplied arguments. Errors are reported back to
    /// the model as the tool result, not propagated to the caller.
    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value>;
}
