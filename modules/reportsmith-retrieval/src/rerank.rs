//! Second-stage relevance scoring over nearest-neighbor candidates.
//!
//! Embedding similarity is a noisy proxy for relevance; the re-ranker has a
//! model judge each candidate passage against the query before the expensive
//! generation step consumes the context.

use ai_client::claude::Claude;
use ai_client::Message;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::QueryMatch;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` by judged relevance to `query`, keeping the top
    /// `top_n`.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<QueryMatch>,
        top_n: usize,
    ) -> Result<Vec<QueryMatch>>;
}

/// LLM response schema for relevance judging.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct RelevanceScores {
    /// One score per passage, in input order, 0.0 (irrelevant) to 1.0
    /// (directly answers the query).
    scores: Vec<f32>,
}

pub struct LlmReranker {
    claude: Claude,
}

impl LlmReranker {
    pub fn new(anthropic_api_key: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, "claude-haiku-4-5-20251001"),
        }
    }

    pub fn with_client(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<QueryMatch>,
        top_n: usize,
    ) -> Result<Vec<QueryMatch>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let passages: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{i}] {}", c.metadata.text))
            .collect();

        let user_prompt = format!(
            "Query: {query}\n\nPassages:\n{}\n\nScore every passage's relevance to the query.",
            passages.join("\n\n")
        );

        let response: RelevanceScores = self
            .claude
            .extract(&[
                Message::system(
                    "You judge retrieval relevance. For each numbered passage, emit one score \
                     between 0.0 and 1.0 for how well it answers the query. Return scores in \
                     passage order.",
                ),
                Message::user(user_prompt),
            ])
            .await?;

        if response.scores.len() != candidates.len() {
            return Err(anyhow!(
                "Reranker returned {} scores for {} passages",
                response.scores.len(),
                candidates.len()
            ));
        }

        let mut scored: Vec<(f32, QueryMatch)> =
            response.scores.into_iter().zip(candidates).collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        debug!(kept = top_n.min(scored.len()), "Rerank complete");

        Ok(scored
            .into_iter()
            .take(top_n)
            .map(|(score, mut m)| {
                m.score = score;
                m
            })
            .collect())
    }
}
