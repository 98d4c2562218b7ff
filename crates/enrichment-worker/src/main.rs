mod cli;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use enrichment_llm_adapters::{build_adapter, AdapterConfig};
use enrichment_worker_core::{start_engine, WorkerConfig, WorkerEvent};

use crate::cli::Cli;
use crate::shutdown::{spawn_ctrl_c_handler, ShutdownController, ShutdownEvent};

fn worker_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| format!("worker-{}", std::process::id()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    let adapter_cfg = AdapterConfig {
        provider: cli.extractor_provider.as_str().to_string(),
        model_fast: cli.extractor_model_fast.clone(),
        model_capable: cli.extractor_model_capable.clone(),
        model_vision: cli.extractor_model_vision.clone(),
        ollama_url: cli.ollama_url.clone(),
        openai_api_key: cli.openai_api_key.clone(),
        anthropic_api_key: cli.anthropic_api_key.clone(),
    };

    let adapter: Arc<dyn enrichment_llm_adapters::ExtractorAdapter> =
        Arc::from(build_adapter(&adapter_cfg, http)?);

    if cli.worker_concurrency == 0 {
        anyhow::bail!("--worker-concurrency must be >= 1");
    }

    let engine = start_engine(
        WorkerConfig {
            api_url: cli.api_url.clone(),
            api_token: cli.api_token.clone(),
            worker_id: worker_id(),
            concurrency: cli.worker_concurrency,
            queue_name: cli.queue_name.clone(),
            lease_duration: WorkerConfig::DEFAULT_LEASE_DURATION,
            idle_poll: WorkerConfig::DEFAULT_IDLE_POLL,
            watchdog_interval: WorkerConfig::DEFAULT_WATCHDOG_INTERVAL,
        },
        adapter,
    );

    tracing::info!(
        concurrency = cli.worker_concurrency,
        queue = %cli.queue_name,
        provider = cli.extractor_provider.as_str(),
        max_retries = cli.max_retries,
        "enrichment worker started"
    );

    let mut events = engine.subscribe();

    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_ctrl_c_handler(shutdown.clone(), shutdown_tx);

    let mut immediate_exit = false;

    loop {
        tokio::select! {
            ev_opt = shutdown_rx.recv() => {
                match ev_opt {
                    Some(ShutdownEvent::Graceful) => {
                        tracing::info!("stop requested, finishing in-flight tasks");
                        engine.request_stop();
                    }
                    Some(ShutdownEvent::Immediate) => {
                        tracing::warn!("stop requested again, exiting immediately");
                        immediate_exit = true;
                        break;
                    }
                    None => {}
                }
            }
            evt = events.recv() => {
                let evt = match evt {
                    Ok(v) => v,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };

                match evt {
                    WorkerEvent::Started | WorkerEvent::StopRequested => {}
                    WorkerEvent::TaskClaimed { consumer_idx, task_id, base_id, doc_type, chunk_index } => {
                        tracing::debug!(
                            consumer_idx, task_id = %task_id, base_id = %base_id,
                            doc_type = %doc_type, chunk_index, "task claimed"
                        );
                    }
                    WorkerEvent::TaskCompleted {
                        consumer_idx, task_id, base_id, doc_type, chunk_index, attempt, elapsed_ms,
                    } => {
                        tracing::info!(
                            event = "enrichment_complete",
                            consumer_idx,
                            task_id = %task_id,
                            base_id = %base_id,
                            doc_type = %doc_type,
                            chunk_index,
                            attempt,
                            elapsed_ms,
                            "enrichment complete"
                        );
                    }
                    WorkerEvent::TaskFailed { consumer_idx, task_id, error } => {
                        tracing::error!(consumer_idx, task_id = %task_id, error = %error, "task failed");
                    }
                    WorkerEvent::StaleLeasesRecovered { recovered } => {
                        tracing::info!(recovered, "recovered stale leases");
                    }
                    WorkerEvent::Warning { message } => {
                        tracing::warn!("{message}");
                    }
                    WorkerEvent::Error { message } => {
                        tracing::error!("{message}");
                    }
                    WorkerEvent::Stopped => break,
                }
            }
        }
    }

    if immediate_exit {
        std::process::exit(130);
    }

    engine.wait().await?;
    Ok(())
}
