use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use enrichment_llm_adapters::ExtractorAdapter;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

use crate::api::{ConsumerSnapshot, ConsumerStage, EngineHandle, StatusSnapshot, WorkerConfig, WorkerEvent};
use crate::control_client::{ControlClient, HttpControlClient};
use crate::{pipeline, watchdog};

pub(crate) struct EngineInner {
    pub(crate) event_tx: broadcast::Sender<WorkerEvent>,
    pub(crate) snapshot_rx: watch::Receiver<StatusSnapshot>,
    snapshot_tx: watch::Sender<StatusSnapshot>,
    consumers: Mutex<Vec<ConsumerSnapshot>>,
    stop_requested: AtomicBool,
    notify: tokio::sync::Notify,
}

impl EngineInner {
    pub(crate) fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            self.emit(WorkerEvent::StopRequested);
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) async fn stop_notified(&self) {
        self.notify.notified().await;
    }

    pub(crate) fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_consumer_stage(&self, consumer_idx: usize, stage: ConsumerStage, current_task_id: Option<String>) {
        {
            let mut consumers = self.consumers.lock().expect("consumer snapshot lock poisoned");
            if let Some(c) = consumers.get_mut(consumer_idx) {
                c.stage = stage;
                c.current_task_id = current_task_id;
            }
        }
        self.push_snapshot();
    }

    fn push_snapshot(&self) {
        let consumers = self.consumers.lock().expect("consumer snapshot lock poisoned").clone();
        let _ = self.snapshot_tx.send(StatusSnapshot {
            stop_requested: self.should_stop(),
            consumers,
        });
    }
}

/// Sleep for `duration`, waking early if the engine is asked to stop.
async fn sleep_or_stop(duration: Duration, inner: &EngineInner) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = inner.stop_notified() => {}
    }
}

async fn run_consumer(
    consumer_idx: usize,
    cfg: Arc<WorkerConfig>,
    control: Arc<dyn ControlClient>,
    adapter: Arc<dyn ExtractorAdapter>,
    inner: Arc<EngineInner>,
) {
    let worker_id = format!("{}-{consumer_idx}", cfg.worker_id);

    loop {
        if inner.should_stop() {
            break;
        }

        inner.set_consumer_stage(consumer_idx, ConsumerStage::Claiming, None);

        let claimed = control.claim(&worker_id, cfg.lease_duration.as_secs()).await;

        let task = match claimed {
            Ok(Some(task)) => task,
            Ok(None) => {
                inner.set_consumer_stage(consumer_idx, ConsumerStage::Idle, None);
                sleep_or_stop(cfg.idle_poll, &inner).await;
                continue;
            }
            Err(err) => {
                inner.emit(WorkerEvent::Warning {
                    message: format!("claim failed: {err:#}"),
                });
                inner.set_consumer_stage(consumer_idx, ConsumerStage::Idle, None);
                sleep_or_stop(cfg.idle_poll, &inner).await;
                continue;
            }
        };

        if let Some(retry_after) = task.retry_after {
            let delay = (retry_after - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            sleep_or_stop(delay, &inner).await;
            if inner.should_stop() {
                break;
            }
        }

        inner.set_consumer_stage(consumer_idx, ConsumerStage::Processing, Some(task.task_id.clone()));
        inner.emit(WorkerEvent::TaskClaimed {
            consumer_idx,
            task_id: task.task_id.clone(),
            base_id: task.base_id.clone(),
            doc_type: task.doc_type.to_string(),
            chunk_index: task.chunk_index,
        });

        let started = Instant::now();
        match pipeline::process_task(control.as_ref(), &adapter, &task).await {
            Ok(()) => {
                inner.emit(WorkerEvent::TaskCompleted {
                    consumer_idx,
                    task_id: task.task_id.clone(),
                    base_id: task.base_id.clone(),
                    doc_type: task.doc_type.to_string(),
                    chunk_index: task.chunk_index,
                    attempt: task.attempt,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(err) => {
                let message = format!("{err:#}");
                if let Err(fail_err) = control.fail(&task.task_id, &message).await {
                    inner.emit(WorkerEvent::Error {
                        message: format!(
                            "failed to report failure for task {}: {fail_err:#}",
                            task.task_id
                        ),
                    });
                }
                inner.emit(WorkerEvent::TaskFailed {
                    consumer_idx,
                    task_id: task.task_id.clone(),
                    error: message,
                });
            }
        }

        inner.set_consumer_stage(consumer_idx, ConsumerStage::Idle, None);
    }
}

pub(crate) fn start_engine(
    cfg: WorkerConfig,
    adapter: Arc<dyn ExtractorAdapter>,
) -> EngineHandle {
    let (event_tx, _) = broadcast::channel::<WorkerEvent>(1024);
    let (snapshot_tx, snapshot_rx) = watch::channel(StatusSnapshot {
        stop_requested: false,
        consumers: Vec::new(),
    });

    let inner = Arc::new(EngineInner {
        event_tx,
        snapshot_rx,
        snapshot_tx,
        consumers: Mutex::new(Vec::new()),
        stop_requested: AtomicBool::new(false),
        notify: tokio::sync::Notify::new(),
    });

    let join = tokio::spawn(run_engine(inner.clone(), cfg, adapter));
    EngineHandle { inner, join }
}

async fn run_engine(
    inner: Arc<EngineInner>,
    mut cfg: WorkerConfig,
    adapter: Arc<dyn ExtractorAdapter>,
) -> anyhow::Result<()> {
    if cfg.concurrency == 0 {
        cfg.concurrency = 1;
    }
    if cfg.lease_duration == Duration::ZERO {
        cfg.lease_duration = WorkerConfig::DEFAULT_LEASE_DURATION;
    }
    if cfg.idle_poll == Duration::ZERO {
        cfg.idle_poll = WorkerConfig::DEFAULT_IDLE_POLL;
    }
    if cfg.watchdog_interval == Duration::ZERO {
        cfg.watchdog_interval = WorkerConfig::DEFAULT_WATCHDOG_INTERVAL;
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|err| anyhow::anyhow!("build http client: {err:#}"))?;

    let control: Arc<dyn ControlClient> = Arc::new(HttpControlClient::new(
        http,
        cfg.api_url.clone(),
        cfg.api_token.clone(),
    ));

    {
        let mut consumers = inner.consumers.lock().expect("consumer snapshot lock poisoned");
        *consumers = (0..cfg.concurrency)
            .map(|consumer_idx| ConsumerSnapshot {
                consumer_idx,
                stage: ConsumerStage::Idle,
                current_task_id: None,
            })
            .collect();
    }

    let cfg = Arc::new(cfg);
    let mut tasks = JoinSet::new();

    for consumer_idx in 0..cfg.concurrency {
        tasks.spawn(run_consumer(
            consumer_idx,
            cfg.clone(),
            control.clone(),
            adapter.clone(),
            inner.clone(),
        ));
    }
    tasks.spawn(watchdog::run_watchdog(control.clone(), cfg.watchdog_interval, inner.clone()));

    inner.emit(WorkerEvent::Started);
    inner.push_snapshot();

    // Every consumer and the watchdog loop forever until `should_stop()`
    // returns true, so any exit observed before that is a fatal,
    // unexpected failure; exits observed after it are the normal shutdown
    // drain and are not errors.
    let mut result: anyhow::Result<()> = Ok(());
    while let Some(join_res) = tasks.join_next().await {
        if inner.should_stop() {
            if let Err(err) = join_res {
                inner.emit(WorkerEvent::Warning {
                    message: format!("task panicked during shutdown: {err:#}"),
                });
            }
            continue;
        }

        let message = match join_res {
            Ok(()) => "a consumer or watchdog task exited unexpectedly".to_string(),
            Err(err) => format!("consumer or watchdog task panicked: {err:#}"),
        };
        inner.request_stop();
        result = Err(anyhow::anyhow!(message));
    }

    if let Err(err) = &result {
        inner.emit(WorkerEvent::Error {
            message: format!("engine error: {err:#}"),
        });
    }
    inner.emit(WorkerEvent::Stopped);
    inner.push_snapshot();
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use enrichment_llm_adapters::{ExtractorAdapter, ImageDescription};
    use enrichment_types::{ClaimedChunk, DocType, Task};
    use reqwest::Url;
    use serde_json::Value;

    use super::*;
    use crate::control_client::SubmitResult;

    /// Never invoked in these tests: every sample task has `chunk_index + 1
    /// < total_chunks`, so `pipeline::process_task` never reaches tier-3.
    struct NoopAdapter;

    #[async_trait]
    impl ExtractorAdapter for NoopAdapter {
        async fn extract_metadata(&self, _text: &str, _doc_type: &str, _schema: &Value, _prompt_template: &str) -> Value {
            unreachable!("tier-3 is not exercised by these tests")
        }

        async fn extract_entities(&self, _text: &str) -> Value {
            unreachable!("tier-3 is not exercised by these tests")
        }

        async fn describe_image(&self, _image_base64: &str, _context: &str) -> ImageDescription {
            unreachable!("tier-3 is not exercised by these tests")
        }

        async fn is_available(&self) -> bool {
            unreachable!("not exercised by these tests")
        }
    }

    /// Records every call instead of making HTTP requests. `tasks` is
    /// drained front-to-back under a lock, so only one of several
    /// concurrent consumers can ever claim a given task.
    struct MockControlClient {
        tasks: Mutex<Vec<Task>>,
        claim_calls: AtomicUsize,
        submit_calls: Mutex<Vec<String>>,
        fail_calls: Mutex<Vec<String>>,
        submit_should_fail: bool,
    }

    impl MockControlClient {
        fn new(tasks: Vec<Task>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
                claim_calls: AtomicUsize::new(0),
                submit_calls: Mutex::new(Vec::new()),
                fail_calls: Mutex::new(Vec::new()),
                submit_should_fail: false,
            }
        }

        fn with_submit_failure(tasks: Vec<Task>) -> Self {
            Self {
                submit_should_fail: true,
                ..Self::new(tasks)
            }
        }
    }

    #[async_trait]
    impl ControlClient for MockControlClient {
        async fn claim(&self, _worker_id: &str, _lease_duration_secs: u64) -> anyhow::Result<Option<Task>> {
            self.claim_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tasks.lock().expect("mock lock poisoned").pop())
        }

        async fn submit(&self, task_id: &str, _result: &SubmitResult<'_>) -> anyhow::Result<()> {
            if self.submit_should_fail {
                anyhow::bail!("mock submit failure");
            }
            self.submit_calls.lock().expect("mock lock poisoned").push(task_id.to_string());
            Ok(())
        }

        async fn fail(&self, task_id: &str, _error: &str) -> anyhow::Result<()> {
            self.fail_calls.lock().expect("mock lock poisoned").push(task_id.to_string());
            Ok(())
        }

        async fn recover_stale(&self) -> anyhow::Result<u32> {
            Ok(0)
        }
    }

    fn sample_task(task_id: &str) -> Task {
        Task {
            task_id: task_id.to_string(),
            attempt: 1,
            base_id: "D".to_string(),
            chunk_index: 0,
            total_chunks: 2,
            doc_type: DocType::Text,
            collection: "default".to_string(),
            text: "hello world".to_string(),
            source: String::new(),
            chunks: vec![ClaimedChunk { chunk_index: 0, text: "hello world".to_string() }],
            retry_after: None,
        }
    }

    fn test_worker_config() -> WorkerConfig {
        WorkerConfig {
            api_url: Url::parse("http://127.0.0.1").unwrap(),
            api_token: "token".to_string(),
            worker_id: "test-worker".to_string(),
            concurrency: 1,
            queue_name: "test".to_string(),
            lease_duration: Duration::from_secs(300),
            idle_poll: Duration::from_millis(5),
            watchdog_interval: Duration::from_secs(60),
        }
    }

    fn test_engine_inner() -> Arc<EngineInner> {
        let (event_tx, _) = broadcast::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(StatusSnapshot {
            stop_requested: false,
            consumers: Vec::new(),
        });
        Arc::new(EngineInner {
            event_tx,
            snapshot_rx,
            snapshot_tx,
            consumers: Mutex::new(vec![ConsumerSnapshot {
                consumer_idx: 0,
                stage: ConsumerStage::Idle,
                current_task_id: None,
            }]),
            stop_requested: AtomicBool::new(false),
            notify: tokio::sync::Notify::new(),
        })
    }

    #[tokio::test]
    async fn idle_claim_produces_no_submit_or_fail_calls() {
        let mock = Arc::new(MockControlClient::new(Vec::new()));
        let control: Arc<dyn ControlClient> = mock.clone();
        let adapter: Arc<dyn ExtractorAdapter> = Arc::new(NoopAdapter);
        let cfg = Arc::new(test_worker_config());
        let inner = test_engine_inner();

        let handle = tokio::spawn(run_consumer(0, cfg, control, adapter, inner.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        inner.request_stop();
        handle.await.unwrap();

        assert!(mock.claim_calls.load(Ordering::SeqCst) > 0);
        assert!(mock.submit_calls.lock().unwrap().is_empty());
        assert!(mock.fail_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_failure_is_reported_as_fail_not_a_second_submit() {
        let mock = Arc::new(MockControlClient::with_submit_failure(vec![sample_task("T1")]));
        let control: Arc<dyn ControlClient> = mock.clone();
        let adapter: Arc<dyn ExtractorAdapter> = Arc::new(NoopAdapter);
        let cfg = Arc::new(test_worker_config());
        let inner = test_engine_inner();

        let handle = tokio::spawn(run_consumer(0, cfg, control, adapter, inner.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        inner.request_stop();
        handle.await.unwrap();

        assert_eq!(mock.fail_calls.lock().unwrap().len(), 1);
        assert!(mock.submit_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_consumers_submit_one_task_exactly_once() {
        let mock = Arc::new(MockControlClient::new(vec![sample_task("T1")]));
        let cfg = Arc::new(test_worker_config());
        let inner = test_engine_inner();

        let mut handles = Vec::new();
        for consumer_idx in 0..4 {
            let control: Arc<dyn ControlClient> = mock.clone();
            let adapter: Arc<dyn ExtractorAdapter> = Arc::new(NoopAdapter);
            handles.push(tokio::spawn(run_consumer(
                consumer_idx,
                cfg.clone(),
                control,
                adapter,
                inner.clone(),
            )));
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        inner.request_stop();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(mock.submit_calls.lock().unwrap().len(), 1);
        assert!(mock.fail_calls.lock().unwrap().is_empty());
    }
}
