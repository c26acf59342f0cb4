use std::sync::atomic::Ordering::Relaxed;
use std::sync::{atomic::AtomicBool, Arc};
use tokio::time::Duration;

use leaky_bucket::RateLimiter;

use crate::server_config::AppConfig;

/// Leaky-bucket throttle shared by the chat and embedding clients, with a
/// backoff latch that any client can trip when the API reports a rate
/// limit.
#[derive(Clone)]
pub struct RateLimiters {
    prompt: Arc<RateLimiter>,
    backoff: Arc<AtomicBool>,
    backoff_duration: Duration,
}

impl RateLimiters {
    pub fn new(
        prompt_limit_per_sec: usize,
        prompt_interval_ms: usize,
        prompt_refill: usize,
    ) -> Self {
        let prompt = RateLimiter::builder()
            .initial(1)
            .interval(Duration::from_millis(prompt_interval_ms as u64))
            .max(prompt_limit_per_sec)
            .refill(prompt_refill)
            .build();

        Self {
            prompt: Arc::new(prompt),
            backoff: Arc::new(AtomicBool::new(false)),
            backoff_duration: Duration::from_secs(60),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.api.prompt_limits.rate_limit_per_sec,
            cfg.api.prompt_limits.refill_interval_ms,
            cfg.api.prompt_limits.refill_amount,
        )
    }

    pub async fn acquire_one(&self) {
        if self.backoff.load(Relaxed) {
            tokio::time::sleep(self.backoff_duration).await;
        }
        self.prompt.acquire_one().await;
    }

    pub fn trigger_backoff(&self) {
        tracing::info!("Triggering backoff...");
        self.backoff.store(true, Relaxed);
        let self_ = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(self_.backoff_duration).await;
            tracing::info!("Backoff expired");
            self_.backoff.store(false, Relaxed);
        });
    }
}
