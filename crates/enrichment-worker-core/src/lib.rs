#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! In-process engine for the enrichment worker: lease claiming, the
//! tier-2/tier-3 pipeline, result submission, and stale-lease recovery.

/// Public API for the engine crate.
pub mod api;

mod control_client;
mod pipeline;
mod scheduler;
mod watchdog;

pub use api::{
    start_engine, ConsumerSnapshot, ConsumerStage, EngineHandle, StatusSnapshot, WorkerConfig,
    WorkerEvent,
};
