use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use crate::error::AppResult;
use crate::rate_limiters::RateLimiters;
use crate::server_config::AppConfig;
use crate::HttpClient;
use std::sync::Arc;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Embeddings client for the configured endpoint, sharing the prompt rate
/// limiter with the chat client.
pub struct HttpEmbedder {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model_id: String,
    rate_limiters: Arc<RateLimiters>,
}

impl HttpEmbedder {
    pub fn new(http_client: HttpClient, cfg: &AppConfig, rate_limiters: Arc<RateLimiters>) -> Self {
        Self {
            http_client,
            endpoint: cfg.api.embed_endpoint.clone(),
            api_key: cfg.api.key.clone(),
            model_id: cfg.model.embed_id.clone(),
            rate_limiters,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.rate_limiters.acquire_one().await;

        let resp = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!(
              {
                "model": &self.model_id,
                "input": text,
              }
            ))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let data = resp["data"].as_array().context("No data array")?;
        let first = data.first().context("No first element")?;
        let embedding: Vec<f32> = serde_json::from_value(first["embedding"].clone())
            .context("Failed to parse embedding as Vec<f32>")?;

        Ok(embedding)
    }
}
