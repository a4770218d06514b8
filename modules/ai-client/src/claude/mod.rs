pub(crate) mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::schema::StructuredOutput;
use crate::tool::Tool;
use crate::traits::{Message, MessageRole};

use types::*;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Options for a plain generation call.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    /// Maximum model round-trips when tools are attached. 1 disables tool use
    /// follow-ups.
    pub max_turns: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_turns: 1,
        }
    }
}

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    http: reqwest::Client,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            tools: Vec::new(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // =========================================================================
    // Wire plumbing
    // =========================================================================

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "Claude chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Claude API error ({}): {}", status, error_text));
        }

        Ok(response.json().await?)
    }

    /// Fold a message list into a request: system messages merge into the
    /// top-level system field, the rest become wire messages.
    fn build_request(&self, messages: &[Message]) -> ChatRequest {
        let mut request = ChatRequest::new(&self.model);
        let mut wire = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => {
                    let existing = request.system.take().unwrap_or_default();
                    let combined = if existing.is_empty() {
                        msg.content.clone()
                    } else {
                        format!("{}\n\n{}", existing, msg.content)
                    };
                    request = request.system(combined);
                }
                MessageRole::User => wire.push(WireMessage::user(&msg.content)),
                MessageRole::Assistant => wire.push(WireMessage::assistant(&msg.content)),
            }
        }

        request.messages(wire)
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Plain text generation. Attached tools are offered to the model and
    /// executed in a loop until it stops calling them or `max_turns` runs out.
    pub async fn generate(&self, messages: &[Message], opts: GenerateOptions) -> Result<String> {
        let mut request = self.build_request(messages);

        if let Some(temp) = opts.temperature {
            request = request.temperature(temp);
        }

        for tool in &self.tools {
            let def = tool.definition();
            request = request.tool(ToolDefinitionWire {
                name: def.name,
                description: def.description,
                input_schema: def.parameters,
            });
        }

        if request.tools.is_some() {
            request.tool_choice = Some(serde_json::json!({"type": "auto"}));
        }

        let mut turn = 0;
        loop {
            turn += 1;
            if turn > opts.max_turns {
                return Err(anyhow!("Max turns ({}) exceeded", opts.max_turns));
            }

            let response = self.chat(&request).await?;

            let tool_uses = response.tool_uses();
            if !tool_uses.is_empty() && response.stop_reason.as_deref() == Some("tool_use") {
                request
                    .messages
                    .push(WireMessage::assistant_blocks(response.content.clone()));

                let mut results = Vec::new();
                for block in &tool_uses {
                    if let ContentBlock::ToolUse { id, name, input } = block {
                        let tool = self
                            .tools
                            .iter()
                            .find(|t| t.definition().name == name.as_str())
                            .ok_or_else(|| anyhow!("Tool not found: {}", name))?;

                        debug!(tool = %name, "Executing tool call");

                        let result = match tool.call(input.clone()).await {
                            Ok(v) => serde_json::to_string(&v)?,
                            Err(e) => format!("Error: {}", e),
                        };

                        results.push(ContentBlock::ToolResult {
                            tool_use_id: id.clone(),
                            content: result,
                        });
                    }
                }

                request.messages.push(WireMessage::tool_results(results));
                continue;
            }

            return Ok(response.text().unwrap_or_default());
        }
    }

    /// Structured output via forced tool use. Fails distinctly when the model's
    /// payload cannot be deserialized into `T`.
    pub async fn extract<T: StructuredOutput>(&self, messages: &[Message]) -> Result<T> {
        let schema = T::tool_schema();

        debug!(type_name = T::type_name(), "Claude structured extraction");

        // Extraction must be deterministic
        let mut request = self.build_request(messages).temperature(0.0);

        let tool_name = "structured_response";
        request = request.tool(ToolDefinitionWire {
            name: tool_name.to_string(),
            description: "Emit the structured response.".to_string(),
            input_schema: schema,
        });
        request.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": tool_name,
        }));

        let response = self.chat(&request).await?;

        for block in &response.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return serde_json::from_value(input.clone())
                    .map_err(|e| anyhow!("Failed to deserialize response: {}", e));
            }
        }

        Err(anyhow!("No structured output in Claude response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001");
        assert_eq!(ai.model, "claude-haiku-4-5-20251001");
        assert_eq!(ai.api_key, "sk-ant-test");
    }

    #[test]
    fn claude_with_base_url() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001")
            .with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, "https://custom.api.com");
    }

    #[test]
    fn system_messages_merge_into_system_field() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001");
        let request = ai.build_request(&[
            Message::system("first"),
            Message::system("second"),
            Message::user("hello"),
        ]);
        assert_eq!(request.system.as_deref(), Some("first\n\nsecond"));
        assert_eq!(request.messages.len(), 1);
    }
}
