use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Panics at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,

    /// Key of the CV quality rule set to evaluate against (§4.6).
    pub rule_set_key: String,
    /// Similarity contract thresholds (§4.1): floor below which a candidate
    /// is discarded, the LOW/AMBIGUOUS boundary, and the AMBIGUOUS/HIGH one.
    pub sim_floor: f64,
    pub sim_low: f64,
    pub sim_high: f64,
    /// `topK` passed to the vector store for each rule chunk (§4.2).
    pub eval_top_k: i64,
    /// Whether the JD Matching Engine may invoke the LLM judge on AMBIGUOUS
    /// chunks (§4.4, §4.7).
    pub llm_judge_enabled: bool,
    /// Similarity at or above which a corroborating mention counts as a
    /// "high" mention for the multi-mention boost (§4.7).
    pub multi_mention_high: f64,

    /// Embedding provider HTTP endpoint. Absent in offline/test
    /// environments, in which case the embedding adapter becomes a no-op
    /// (§4.3).
    pub embedding_api_url: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", "8080").parse::<u16>().context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            rule_set_key: env_or("RULE_SET_KEY", "default"),
            sim_floor: env_or("SIM_FLOOR", "0.15").parse().context("SIM_FLOOR must be a float")?,
            sim_low: env_or("SIM_LOW", "0.40").parse().context("SIM_LOW must be a float")?,
            sim_high: env_or("SIM_HIGH", "0.75").parse().context("SIM_HIGH must be a float")?,
            eval_top_k: env_or("EVAL_TOP_K", "5").parse().context("EVAL_TOP_K must be an integer")?,
            llm_judge_enabled: env_or("LLM_JUDGE_ENABLED", "true")
                .parse()
                .context("LLM_JUDGE_ENABLED must be a boolean")?,
            multi_mention_high: env_or("MULTI_MENTION_HIGH", "0.60")
                .parse()
                .context("MULTI_MENTION_HIGH must be a float")?,
            embedding_api_url: std::env::var("EMBEDDING_API_URL").ok(),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            embedding_model: env_or("EMBEDDING_MODEL", "voyage-3"),
            embedding_dimension: env_or("EMBEDDING_DIMENSION", "1024")
                .parse()
                .context("EMBEDDING_DIMENSION must be an integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
