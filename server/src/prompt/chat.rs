use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::json;

use crate::error::AppResult;
use crate::prompt::{ChatCompletion, ChatModel, ChatRequest, ChatApiResponseOrError};
use crate::rate_limiters::RateLimiters;
use crate::server_config::AppConfig;
use crate::HttpClient;

/// Chat-completions client for the configured model endpoint. Every call
/// waits on the prompt rate limiter first; a rate-limit error from the API
/// latches the backoff shared by all in-flight work.
pub struct HttpChatModel {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model_id: String,
    temperature: f64,
    rate_limiters: Arc<RateLimiters>,
}

impl HttpChatModel {
    pub fn new(http_client: HttpClient, cfg: &AppConfig, rate_limiters: Arc<RateLimiters>) -> Self {
        Self {
            http_client,
            endpoint: cfg.api.chat_endpoint.clone(),
            api_key: cfg.api.key.clone(),
            model_id: cfg.model.id.clone(),
            temperature: cfg.model.temperature,
            rate_limiters,
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, request: ChatRequest) -> AppResult<ChatCompletion> {
        self.rate_limiters.acquire_one().await;

        let resp = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!(
              {
                "model": &self.model_id,
                "temperature": self.temperature,
                "messages": [
                  {
                    "role": "system",
                    "content": request.system
                  },
                  {
                    "role": "user",
                    "content": request.user
                  }
                ],
                "response_format": { "type": "json_object" }
              }
            ))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
            .context(format!("Could not parse chat response: {}", resp))?;

        let parsed = match parsed {
            ChatApiResponseOrError::Error(error) => {
                if error.message.contains("rate limit") {
                    self.rate_limiters.trigger_backoff();
                }
                return Err(anyhow!("Chat API error: {:?}", error).into());
            }
            ChatApiResponseOrError::Response(parsed) => parsed,
        };

        let choice = parsed.choices.first().context("No choices in response")?;

        Ok(ChatCompletion {
            content: choice.message.content.clone(),
            total_tokens: parsed.usage.total_tokens,
        })
    }
}
