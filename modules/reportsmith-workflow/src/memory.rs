//! Agent conversation memory, scoped per report and per run.
//!
//! Plan generation is memory-scoped `(resource = report id, thread = run id)`
//! so conversational context never leaks across reports or runs.

use std::collections::HashMap;

use ai_client::Message;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryScope {
    pub resource: String,
    pub thread: String,
}

impl MemoryScope {
    pub fn new(resource: impl Into<String>, thread: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            thread: thread.into(),
        }
    }
}

#[async_trait]
pub trait AgentMemory: Send + Sync {
    /// Prior turns for the scope, oldest first.
    async fn history(&self, scope: &MemoryScope) -> Result<Vec<Message>>;

    /// Append one turn. `role` is `"user"` or `"assistant"`.
    async fn append(&self, scope: &MemoryScope, role: &str, content: &str) -> Result<()>;
}

fn to_message(role: &str, content: String) -> Message {
    match role {
        "assistant" => Message::assistant(content),
        _ => Message::user(content),
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAgentMemory {
    turns: RwLock<HashMap<MemoryScope, Vec<(String, String)>>>,
}

impl InMemoryAgentMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentMemory for InMemoryAgentMemory {
    async fn history(&self, scope: &MemoryScope) -> Result<Vec<Message>> {
        Ok(self
            .turns
            .read()
            .await
            .get(scope)
            .map(|turns| {
                turns
                    .iter()
                    .map(|(role, content)| to_message(role, content.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, scope: &MemoryScope, role: &str, content: &str) -> Result<()> {
        self.turns
            .write()
            .await
            .entry(scope.clone())
            .or_default()
            .push((role.to_string(), content.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgAgentMemory {
    pool: PgPool,
}

impl PgAgentMemory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_memory (
                id          BIGSERIAL    PRIMARY KEY,
                resource    TEXT         NOT NULL,
                thread      TEXT         NOT NULL,
                role        TEXT         NOT NULL,
                content     TEXT         NOT NULL,
                created_at  TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS agent_memory_scope_idx ON agent_memory (resource, thread, id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AgentMemory for PgAgentMemory {
    async fn history(&self, scope: &MemoryScope) -> Result<Vec<Message>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT role, content
            FROM agent_memory
            WHERE resource = $1 AND thread = $2
            ORDER BY id ASC
            "#,
        )
        .bind(&scope.resource)
        .bind(&scope.thread)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(role, content)| to_message(&role, content))
            .collect())
    }

    async fn append(&self, scope: &MemoryScope, role: &str, content: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO agent_memory (resource, thread, role, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(&scope.resource)
        .bind(&scope.thread)
        .bind(role)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::MessageRole;

    #[tokio::test]
    async fn history_is_ordered_and_typed() {
        let memory = InMemoryAgentMemory::new();
        let scope = MemoryScope::new("rep-1", "run-1");

        memory.append(&scope, "user", "first").await.unwrap();
        memory.append(&scope, "assistant", "second").await.unwrap();

        let history = memory.history(&scope).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let memory = InMemoryAgentMemory::new();
        let a = MemoryScope::new("rep-1", "run-1");
        let b = MemoryScope::new("rep-1", "run-2");

        memory.append(&a, "user", "for run one").await.unwrap();

        assert_eq!(memory.history(&a).await.unwrap().len(), 1);
        assert!(memory.history(&b).await.unwrap().is_empty());
    }
}
