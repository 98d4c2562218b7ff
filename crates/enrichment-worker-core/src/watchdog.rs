//! Lease watchdog: periodically recovers tasks whose lease has expired.

use std::sync::Arc;
use std::time::Duration;

use crate::api::WorkerEvent;
use crate::control_client::ControlClient;
use crate::scheduler::EngineInner;

/// Run the watchdog loop: sleep `interval`, call `recover-stale`, repeat,
/// until the engine is asked to stop.
///
/// Mirrors the original watchdog's "sleep, try, log on error" shape: a
/// single failed tick is reported as a warning and does not end the loop.
pub(crate) async fn run_watchdog(
    control: Arc<dyn ControlClient>,
    interval: Duration,
    inner: Arc<EngineInner>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.stop_notified() => break,
        }
        if inner.should_stop() {
            break;
        }

        match control.recover_stale().await {
            Ok(0) => {}
            Ok(recovered) => {
                inner.emit(WorkerEvent::StaleLeasesRecovered { recovered });
            }
            Err(err) => {
                inner.emit(WorkerEvent::Warning {
                    message: format!("watchdog recover-stale failed: {err:#}"),
                });
            }
        }
    }
}
