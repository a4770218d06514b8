use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::claude::Claude;
use reportsmith_common::Config;
use reportsmith_retrieval::{
    Embedder, LlmReranker, Reranker, TextEmbedder, UpstashVectorStore, VectorStore,
};
use reportsmith_workflow::steps::DocumentIngestor;
use reportsmith_workflow::{
    PgAgentMemory, PgRunRecordStore, PgRunStore, RagChapterGenerator, ReportAgent,
    RunRecordStore, StatusMirror, TavilySearcher, WebSearcher, WorkflowDeps, WorkflowService,
};

mod rest;

const GENERATION_MODEL: &str = "claude-haiku-4-5-20251001";

pub struct AppState {
    pub service: WorkflowService,
    pub records: Arc<dyn RunRecordStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("reportsmith=info".parse()?),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPool::connect(&config.database_url).await?;
    PgRunStore::init_schema(&pool).await?;
    PgRunRecordStore::init_schema(&pool).await?;
    PgAgentMemory::init_schema(&pool).await?;

    let claude = Claude::new(&config.anthropic_api_key, GENERATION_MODEL);
    let searcher: Arc<dyn WebSearcher> = Arc::new(TavilySearcher::new(
        config.tavily_api_key.clone(),
        reqwest::Client::new(),
    ));
    let memory = Arc::new(PgAgentMemory::new(pool.clone()));
    let agent = ReportAgent::new(claude, memory, searcher);

    let embedder: Arc<dyn TextEmbedder> = Arc::new(Embedder::new(&config.openai_api_key));
    let vectors: Arc<dyn VectorStore> = Arc::new(UpstashVectorStore::new(
        &config.upstash_vector_url,
        &config.upstash_vector_token,
    ));
    let reranker: Arc<dyn Reranker> = Arc::new(LlmReranker::new(&config.anthropic_api_key));

    let records: Arc<dyn RunRecordStore> = Arc::new(PgRunRecordStore::new(pool.clone()));

    let service = WorkflowService::new(WorkflowDeps {
        run_store: Arc::new(PgRunStore::new(pool.clone())),
        mirror: StatusMirror::new(records.clone()),
        ingestor: DocumentIngestor::new(embedder.clone(), vectors.clone()),
        planner: Arc::new(agent.clone()),
        chapters: Arc::new(RagChapterGenerator::new(
            agent, embedder, vectors, reranker,
        )),
        max_concurrent_chapters: config.max_concurrent_chapters,
    });

    let state = Arc::new(AppState { service, records });

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/api/workflow/start", post(rest::start_workflow))
        .route("/api/workflow/resume", post(rest::resume_workflow))
        .route(
            "/api/workflow/{run_id}",
            get(rest::get_workflow).delete(rest::cancel_workflow),
        )
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr = %addr, "Reportsmith API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
