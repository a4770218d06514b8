use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI providers
    pub anthropic_api_key: String,
    pub openai_api_key: String,

    // Web search
    pub tavily_api_key: String,

    // Vector index
    pub upstash_vector_url: String,
    pub upstash_vector_token: String,

    // Postgres (run snapshots, mirrored records, agent memory)
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Fan-out bound for chapter generation
    pub max_concurrent_chapters: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            openai_api_key: required_env("OPENAI_API_KEY"),
            tavily_api_key: required_env("TAVILY_API_KEY"),
            upstash_vector_url: required_env("UPSTASH_VECTOR_REST_URL"),
            upstash_vector_token: required_env("UPSTASH_VECTOR_REST_TOKEN"),
            database_url: required_env("DATABASE_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            max_concurrent_chapters: env::var("MAX_CONCURRENT_CHAPTERS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("MAX_CONCURRENT_CHAPTERS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
