//! Web search: the Tavily adapter and the agent-facing tool wrapper.

use std::sync::Arc;

use ai_client::tool::{Tool, ToolDefinition};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>>;
}

/// Tavily web search adapter.
pub struct TavilySearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest {
    api_key: String,
    query: String,
    max_results: u32,
    search_depth: String,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: String,
    content: String,
}

impl TavilySearcher {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let request = TavilySearchRequest {
            api_key: self.api_key.clone(),
            query: query.to_string(),
            max_results,
            search_depth: "advanced".to_string(),
        };

        let resp: TavilySearchResponse = self
            .client
            .post("https://api.tavily.com/search")
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// WebSearchTool — the agent-facing wrapper
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WebSearchOutput {
    results: Vec<WebSearchResult>,
    result_count: usize,
}

#[derive(Debug, Serialize)]
struct WebSearchResult {
    title: String,
    url: String,
    snippet: String,
}

/// Offered to the model during chapter generation so it can research topics
/// with no ingested context.
pub struct WebSearchTool {
    searcher: Arc<dyn WebSearcher>,
}

impl WebSearchTool {
    pub fn new(searcher: Arc<dyn WebSearcher>) -> Self {
        Self { searcher }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the web for current information about a topic.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "How many results to return (default 5)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let args: WebSearchArgs = serde_json::from_value(args)?;

        let hits = self
            .searcher
            .search(&args.query, args.max_results.unwrap_or(5))
            .await?;

        let results: Vec<WebSearchResult> = hits
            .into_iter()
            .map(|hit| WebSearchResult {
                title: hit.title,
                url: hit.url,
                snippet: hit.content.chars().take(500).collect(),
            })
            .collect();

        let result_count = results.len();

        Ok(serde_json::to_value(WebSearchOutput {
            results,
            result_count,
        })?)
    }
}
