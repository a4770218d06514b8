//! The report agent and the retrieval-augmented generators built on it.

use std::sync::Arc;

use ai_client::claude::{Claude, GenerateOptions};
use ai_client::Message;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use reportsmith_common::{Chapter, ChapterContent, Plan, ReportInput};
use reportsmith_retrieval::{report_namespace, Reranker, TextEmbedder, VectorStore};

use crate::memory::{AgentMemory, MemoryScope};
use crate::tools::{WebSearchTool, WebSearcher};

const AGENT_INSTRUCTIONS: &str = "You are a report agent that generates reports based on user \
     context and files. Use the web_search tool to gather information when the topic is \
     unfamiliar: repositories, articles, documentation.";

const CHAPTER_SYSTEM_PROMPT: &str = r#"You are a technical report writer. Generate comprehensive, well-structured content in proper markdown format. Use your tools to search for detailed information if you don't know about the topic.

REQUIRED MARKDOWN STRUCTURE:
## [Chapter Title]

### Overview
[Detailed explanation of what this chapter covers - expand on the chapter description with context and importance]

### [Section Title]
[Comprehensive content for this section with technical details, examples, and explanations]

FORMATTING REQUIREMENTS:
- Use ## for the chapter title
- Use ### for section titles
- Use **bold** for important terms
- Use `code` for technical terms, commands, or code snippets
- Use bullet points with - for lists
- Use numbered lists 1. 2. 3. when showing steps
- Include code blocks with ```language when relevant
- Keep paragraphs well-structured and readable

CONTENT REQUIREMENTS:
- Search for current, accurate information using your tools
- Provide practical examples and real-world applications
- Include technical details and best practices
- Make content comprehensive but accessible
- Each section should be substantial (200-500 words minimum)"#;

// ---------------------------------------------------------------------------
// Generator seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Propose a plan for the report, grounded in the ingested text when
    /// present.
    async fn generate_plan(
        &self,
        input: &ReportInput,
        ingested_text: Option<&str>,
        run_id: Uuid,
    ) -> Result<Plan>;
}

#[async_trait]
pub trait ChapterGenerator: Send + Sync {
    /// Generate one chapter's prose. Invoked concurrently across chapters;
    /// implementations must not share mutable state between calls.
    async fn generate_chapter(
        &self,
        input: &ReportInput,
        chapter: &Chapter,
        chapter_index: usize,
    ) -> Result<ChapterContent>;
}

// ---------------------------------------------------------------------------
// ReportAgent
// ---------------------------------------------------------------------------

/// Claude with the web_search tool attached and conversation memory scoped per
/// report and per run.
#[derive(Clone)]
pub struct ReportAgent {
    claude: Claude,
    memory: Arc<dyn AgentMemory>,
    searcher: Arc<dyn WebSearcher>,
}

impl ReportAgent {
    pub fn new(
        claude: Claude,
        memory: Arc<dyn AgentMemory>,
        searcher: Arc<dyn WebSearcher>,
    ) -> Self {
        let claude = claude.with_tool(Arc::new(WebSearchTool::new(searcher.clone())));
        Self {
            claude,
            memory,
            searcher,
        }
    }

    /// Research context for a plan when no documents were ingested. Search
    /// failures degrade to an unassisted plan rather than failing the run.
    async fn research(&self, topic: &str) -> Option<String> {
        match self.searcher.search(topic, 5).await {
            Ok(hits) if !hits.is_empty() => {
                let findings: Vec<String> = hits
                    .into_iter()
                    .map(|hit| {
                        let snippet: String = hit.content.chars().take(500).collect();
                        format!("- {} ({}): {}", hit.title, hit.url, snippet)
                    })
                    .collect();
                Some(findings.join("\n"))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Web research for plan failed, continuing without");
                None
            }
        }
    }
}

#[async_trait]
impl PlanGenerator for ReportAgent {
    async fn generate_plan(
        &self,
        input: &ReportInput,
        ingested_text: Option<&str>,
        run_id: Uuid,
    ) -> Result<Plan> {
        let additional_context = match ingested_text {
            Some(text) => format!("Here is some relevant information to the report:\n{text}"),
            None => match self.research(&input.user_context).await {
                Some(findings) => {
                    format!("Web research findings relevant to the report:\n{findings}")
                }
                None => "We do not have any additional context to the report, so please \
                         rely on your own knowledge of the topic."
                    .to_string(),
            },
        };

        let directive = format!(
            "Generate the report main chapters needed for the report. If the user is \
             demanding something that you have no idea about, ground the plan in the \
             context below.\n\n{additional_context}"
        );

        let scope = MemoryScope::new(&input.report_id, run_id.to_string());

        let mut messages = vec![
            Message::system(AGENT_INSTRUCTIONS),
            Message::system(directive),
        ];
        messages.extend(self.memory.history(&scope).await?);
        messages.push(Message::user(&input.user_context));

        let plan: Plan = self.claude.extract(&messages).await?;

        if plan.chapters.is_empty() {
            return Err(anyhow!("Model proposed a plan with no chapters"));
        }

        self.memory
            .append(&scope, "user", &input.user_context)
            .await?;
        self.memory
            .append(&scope, "assistant", &serde_json::to_string(&plan)?)
            .await?;

        info!(
            report_id = %input.report_id,
            chapters = plan.chapters.len(),
            "Report plan generated"
        );

        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// RagChapterGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    /// Nearest neighbors fetched from the vector store.
    pub top_k: usize,
    /// Passages kept after reranking.
    pub top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, top_n: 3 }
    }
}

/// Retrieve-then-rerank chapter generation: embed the chapter query, fetch
/// top-K neighbors from the report's namespace, keep the reranked top-N as
/// grounding context, then generate.
pub struct RagChapterGenerator {
    agent: ReportAgent,
    embedder: Arc<dyn TextEmbedder>,
    vectors: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    config: RetrievalConfig,
}

impl RagChapterGenerator {
    pub fn new(
        agent: ReportAgent,
        embedder: Arc<dyn TextEmbedder>,
        vectors: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        Self {
            agent,
            embedder,
            vectors,
            reranker,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    async fn chapter_context(&self, report_id: &str, chapter: &Chapter) -> Result<Option<String>> {
        let query = format!("{} {}", chapter.title, chapter.description);

        let embedding = self.embedder.embed(&query).await?;
        let candidates = self
            .vectors
            .query(&report_namespace(report_id), &embedding, self.config.top_k)
            .await?;

        if candidates.is_empty() {
            return Ok(None);
        }

        let kept = self
            .reranker
            .rerank(&query, candidates, self.config.top_n)
            .await?;

        let knowledge: Vec<String> = kept.into_iter().map(|m| m.metadata.text).collect();
        if knowledge.is_empty() {
            return Ok(None);
        }

        Ok(Some(knowledge.join("\n")))
    }
}

#[async_trait]
impl ChapterGenerator for RagChapterGenerator {
    async fn generate_chapter(
        &self,
        input: &ReportInput,
        chapter: &Chapter,
        chapter_index: usize,
    ) -> Result<ChapterContent> {
        let additional_context = match self.chapter_context(&input.report_id, chapter).await? {
            Some(knowledge) => {
                format!("Here is some relevant information to the chapter:\n{knowledge}")
            }
            None => "We do not have any additional context to the chapter, so please search \
                     the web very carefully for relevant information."
                .to_string(),
        };

        let sections: Vec<String> = chapter
            .sections
            .iter()
            .map(|s| format!("- **{}:** {}", s.title, s.description))
            .collect();

        let user_prompt = format!(
            "Generate a comprehensive chapter with this structure:\n\n\
             **Chapter Title:** {}\n\
             **Chapter Description:** {}\n\n\
             **Sections to cover:**\n{}\n\n\
             Generate detailed, technical content for each section. Use your tools to \
             research current information, best practices, and real examples. Ensure each \
             section is comprehensive and valuable.\n\n{}",
            chapter.title,
            chapter.description,
            sections.join("\n"),
            additional_context
        );

        let prose = self
            .agent
            .claude
            .generate(
                &[
                    Message::system(CHAPTER_SYSTEM_PROMPT),
                    Message::user(user_prompt),
                ],
                GenerateOptions {
                    max_turns: 4,
                    ..Default::default()
                },
            )
            .await?;

        info!(
            report_id = %input.report_id,
            chapter_index,
            title = %chapter.title,
            chars = prose.len(),
            "Chapter content generated"
        );

        Ok(ChapterContent {
            chapter_index,
            title: chapter.title.clone(),
            chapter_content: prose,
        })
    }
}
