//! Public API types for the in-process enrichment worker engine.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Configuration for the in-process worker engine.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Control-API base URL (e.g. `http://127.0.0.1:8080`).
    pub api_url: Url,
    /// Bearer token sent with every control-API call.
    pub api_token: String,
    /// Stable identifier for this process, used as the lease owner.
    pub worker_id: String,
    /// Number of consumers to run concurrently.
    pub concurrency: usize,
    /// Queue name, echoed into structured log lines.
    pub queue_name: String,
    /// Lease duration requested on `claim`.
    pub lease_duration: Duration,
    /// Poll interval after an empty claim or a transient consumer error.
    pub idle_poll: Duration,
    /// Watchdog tick interval.
    pub watchdog_interval: Duration,
}

impl WorkerConfig {
    /// Default lease duration requested on `claim` (5 minutes, matching the
    /// fixed-lease assumption the control API's stale-recovery relies on).
    pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(300);

    /// Default poll interval after an empty claim.
    pub const DEFAULT_IDLE_POLL: Duration = Duration::from_secs(1);

    /// Default watchdog tick interval.
    pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);
}

/// Stage of a consumer in the claim/process/submit lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsumerStage {
    /// Waiting on `claim`.
    Claiming,
    /// Running the pipeline over a claimed task.
    Processing,
    /// No task claimed, sleeping out the idle poll interval.
    Idle,
}

/// Snapshot of a single consumer's current state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumerSnapshot {
    /// Consumer index (0-based).
    pub consumer_idx: usize,
    /// Current stage.
    pub stage: ConsumerStage,
    /// `taskId` of the task currently claimed, if any.
    pub current_task_id: Option<String>,
}

/// Current engine state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Whether the engine has been asked to stop.
    pub stop_requested: bool,
    /// Per-consumer snapshots.
    pub consumers: Vec<ConsumerSnapshot>,
}

/// Engine event stream payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WorkerEvent {
    /// Engine started.
    Started,
    /// Engine is stopping (graceful shutdown requested).
    StopRequested,
    /// A consumer claimed a task.
    TaskClaimed {
        /// Consumer index (0-based).
        consumer_idx: usize,
        /// Claimed task identifier.
        task_id: String,
        /// Document identifier the task's chunk belongs to.
        base_id: String,
        /// Document-type tag.
        doc_type: String,
        /// 0-based chunk ordinal.
        chunk_index: u32,
    },
    /// A consumer completed a task's full pipeline run and submitted its result.
    TaskCompleted {
        /// Consumer index (0-based).
        consumer_idx: usize,
        /// Completed task identifier.
        task_id: String,
        /// Document identifier.
        base_id: String,
        /// Document-type tag.
        doc_type: String,
        /// 0-based chunk ordinal.
        chunk_index: u32,
        /// Delivery attempt number.
        attempt: u32,
        /// Total pipeline time, in milliseconds.
        elapsed_ms: u64,
    },
    /// A consumer reported a task failure to the control API.
    TaskFailed {
        /// Consumer index (0-based).
        consumer_idx: usize,
        /// Failed task identifier.
        task_id: String,
        /// Failure message reported to the control API.
        error: String,
    },
    /// The watchdog recovered one or more stale leases.
    StaleLeasesRecovered {
        /// Number of leases recovered.
        recovered: u32,
    },
    /// A non-fatal warning from the engine (e.g. a tier-2 sub-failure).
    Warning {
        /// Warning message.
        message: String,
    },
    /// A non-fatal error from the engine (e.g. a transient control-API error).
    Error {
        /// Error message.
        message: String,
    },
    /// Engine stopped (no more consumers or watchdog running).
    Stopped,
}

/// Handle to a running in-process engine instance.
pub struct EngineHandle {
    pub(crate) inner: std::sync::Arc<crate::scheduler::EngineInner>,
    pub(crate) join: tokio::task::JoinHandle<anyhow::Result<()>>,
}

/// Start a new in-process engine instance.
pub fn start_engine(
    config: WorkerConfig,
    adapter: std::sync::Arc<dyn enrichment_llm_adapters::ExtractorAdapter>,
) -> EngineHandle {
    crate::scheduler::start_engine(config, adapter)
}

impl EngineHandle {
    /// Subscribe to the engine event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Get the latest engine snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.snapshot_rx.borrow().clone()
    }

    /// Request a graceful shutdown (finish in-flight tasks, stop claiming new ones).
    pub fn request_stop(&self) {
        self.inner.request_stop();
    }

    /// Wait for the engine to stop, returning the engine task result.
    pub async fn wait(self) -> anyhow::Result<()> {
        match self.join.await {
            Ok(res) => res,
            Err(err) => Err(anyhow::anyhow!("engine task join error: {err}")),
        }
    }
}
