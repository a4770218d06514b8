use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{QueryMatch, RecordMetadata, VectorRecord, VectorStore};

/// Upstash Vector REST adapter. Each report gets its own namespace, so
/// concurrent chapter queries never contend on data.
pub struct UpstashVectorStore {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct UpsertItem<'a> {
    id: &'a str,
    vector: &'a [f32],
    metadata: &'a RecordMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    id: String,
    score: f32,
    metadata: Option<RecordMetadata>,
}

impl UpstashVectorStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Upstash Vector error ({}): {}", status, error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl VectorStore for UpstashVectorStore {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        let items: Vec<UpsertItem<'_>> = records
            .iter()
            .map(|r| UpsertItem {
                id: &r.id,
                vector: &r.vector,
                metadata: &r.metadata,
            })
            .collect();

        debug!(namespace, count = items.len(), "Upstash upsert");
        self.post(&format!("upsert/{namespace}"), &items).await?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response: QueryResponse = self
            .post(&format!("query/{namespace}"), &request)
            .await?
            .json()
            .await?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|r| {
                r.metadata.map(|metadata| QueryMatch {
                    id: r.id,
                    score: r.score,
                    metadata,
                })
            })
            .collect())
    }
}
