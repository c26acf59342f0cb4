mod email;
mod error;
mod model;
mod observability;
mod pipeline;
mod prompt;
mod quota;
mod rate_limiters;
mod retrieval;
mod server_config;
mod store;
mod testing;

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use mimalloc::MiMalloc;
use tokio::{signal, task::JoinHandle};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::email::gmail::GmailMailboxProvider;
use crate::pipeline::orchestrator::BatchRunner;
use crate::prompt::chat::HttpChatModel;
use crate::rate_limiters::RateLimiters;
use crate::retrieval::embedder::HttpEmbedder;
use crate::server_config::AppConfig;
use crate::store::MemoryUserStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let cfg = Arc::new(AppConfig::load()?);
    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;
    let rate_limiters = Arc::new(RateLimiters::from_config(&cfg));

    let runner = Arc::new(BatchRunner {
        cfg: Arc::clone(&cfg),
        store: Arc::new(MemoryUserStore::new()),
        chat: Arc::new(HttpChatModel::new(
            http_client.clone(),
            &cfg,
            Arc::clone(&rate_limiters),
        )),
        embedder: Arc::new(HttpEmbedder::new(
            http_client.clone(),
            &cfg,
            Arc::clone(&rate_limiters),
        )),
        provider: Arc::new(GmailMailboxProvider::new(http_client.clone())),
    });

    let mut scheduler = JobScheduler::new()
        .await
        .expect("Failed to create scheduler");

    {
        let runner = Arc::clone(&runner);
        let interval = Duration::from_secs(cfg.processing.batch_interval_mins * 60);
        scheduler
            .add(Job::new_repeated_async(interval, move |uuid, _l| {
                let runner = Arc::clone(&runner);
                Box::pin(async move {
                    tracing::info!("Running batch job {}", uuid);
                    match runner.run_batch().await {
                        Ok(summary) => {
                            tracing::info!("Batch job {} finished: {:?}", uuid, summary);
                        }
                        Err(e) => {
                            tracing::error!("Batch job {} failed: {:?}", uuid, e);
                        }
                    }
                })
            })?)
            .await?;
    }

    // Build indexes shortly after startup so the first batch has context,
    // then refresh them on their own schedule.
    {
        let runner = Arc::clone(&runner);
        scheduler
            .add(Job::new_one_shot_async(
                Duration::from_secs(10),
                move |_uuid, _l| {
                    let runner = Arc::clone(&runner);
                    Box::pin(async move {
                        match runner.rebuild_all_indexes().await {
                            Ok(rebuilt) => {
                                tracing::info!("Initial index build covered {} users", rebuilt);
                            }
                            Err(e) => {
                                tracing::error!("Initial index build failed: {:?}", e);
                            }
                        }
                    })
                },
            )?)
            .await?;
    }

    {
        let runner = Arc::clone(&runner);
        let interval = Duration::from_secs(cfg.processing.index_rebuild_interval_mins * 60);
        scheduler
            .add(Job::new_repeated_async(interval, move |_uuid, _l| {
                let runner = Arc::clone(&runner);
                Box::pin(async move {
                    match runner.rebuild_all_indexes().await {
                        Ok(rebuilt) => {
                            tracing::info!("Index rebuild covered {} users", rebuilt);
                        }
                        Err(e) => {
                            tracing::error!("Index rebuild failed: {:?}", e);
                        }
                    }
                })
            })?)
            .await?;
    }

    scheduler.set_shutdown_handler(Box::new(move || {
        Box::pin(async move {
            tracing::info!("Shutting down scheduler");
        })
    }));

    match scheduler.start().await {
        Ok(_) => {
            tracing::info!("Scheduler started, batch every {} mins", cfg.processing.batch_interval_mins);
        }
        Err(e) => {
            tracing::error!("Failed to start scheduler: {:?}", e);
        }
    }

    let health_router = Router::new().route("/", get(|| async { "OK" }));
    run_server(health_router, scheduler).await?;

    Ok(())
}

async fn shutdown_signal(mut scheduler: JobScheduler) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            scheduler.shutdown().await.ok();
            tracing::info!("Cleanups done, shutting down");
        },
        _ = terminate => {
            scheduler.shutdown().await.ok();
            tracing::info!("Cleanups done, shutting down");
        },
    }
}

fn run_server(router: Router, scheduler: JobScheduler) -> JoinHandle<()> {
    tokio::spawn(async {
        let port = env::var("PORT").unwrap_or("5006".to_string());
        tracing::info!("Triage server running on http://0.0.0.0:{}", port);

        let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>().unwrap()));
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown_signal(scheduler))
            .await
            .unwrap();
    })
}
