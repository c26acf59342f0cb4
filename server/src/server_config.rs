use config::{Config, ConfigError};
use serde::Deserialize;
use std::{env, path::Path, result::Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
    pub chat_endpoint: String,
    pub embed_endpoint: String,
    pub prompt_limits: PromptLimits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptLimits {
    pub rate_limit_per_sec: usize,
    pub refill_interval_ms: usize,
    pub refill_amount: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub embed_id: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Upper bound on in-flight message pipelines for one user.
    pub max_concurrent_messages: usize,
    /// Upper bound on users processed in parallel per batch run.
    pub max_concurrent_users: usize,
    /// Unread messages pulled per user per batch run.
    pub unread_batch_limit: usize,
    /// Per-stage deadline for model and retrieval calls.
    pub stage_timeout_secs: u64,
    /// Minutes between batch runs.
    pub batch_interval_mins: u64,
    /// Minutes between reply index rebuilds.
    pub index_rebuild_interval_mins: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Corpus entries shorter than this are not indexed.
    pub min_entry_chars: usize,
    pub max_neighbors: usize,
    pub score_threshold: f32,
    /// Sent messages scanned when rebuilding a user's index.
    pub corpus_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Drafts granted at account verification.
    pub initial_drafts: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    pub cue_phrases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub model: ModelConfig,
    pub processing: ProcessingConfig,
    pub retrieval: RetrievalConfig,
    pub quota: QuotaConfig,
    pub filter: FilterConfig,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        builder.try_deserialize()
    }

    /// Load `config.toml` from `APP_DIR`, falling back to the workspace
    /// `config/` directory during development.
    pub fn load() -> Result<Self, ConfigError> {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let mut cfg = Self::from_file(&format!("{root}/config.toml"))?;
        if let Ok(key) = env::var("MODEL_API_KEY") {
            cfg.api.key = key;
        }
        Ok(cfg)
    }
}

pub fn default_cue_phrases() -> Vec<String> {
    [
        "sale",
        "discount",
        "% off",
        "limited time",
        "free trial",
        "act now",
        "buy now",
        "promo code",
        "exclusive offer",
        "unsubscribe",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api: ApiConfig {
                key: String::new(),
                chat_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                embed_endpoint: "https://api.openai.com/v1/embeddings".to_string(),
                prompt_limits: PromptLimits {
                    rate_limit_per_sec: 10,
                    refill_interval_ms: 100,
                    refill_amount: 1,
                },
            },
            model: ModelConfig {
                id: "gpt-4o".to_string(),
                embed_id: "text-embedding-3-small".to_string(),
                temperature: 0.0,
            },
            processing: ProcessingConfig {
                max_concurrent_messages: 10,
                max_concurrent_users: 4,
                unread_batch_limit: 5,
                stage_timeout_secs: 30,
                batch_interval_mins: 30,
                index_rebuild_interval_mins: 1440,
            },
            retrieval: RetrievalConfig {
                min_entry_chars: 40,
                max_neighbors: 5,
                score_threshold: 0.7,
                corpus_limit: 200,
            },
            quota: QuotaConfig {
                initial_drafts: 100,
            },
            filter: FilterConfig {
                cue_phrases: default_cue_phrases(),
            },
        }
    }
}
