//! Background replay-cache eviction on a tokio interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;

use crate::domain::replay::{ReplayGuard, SweepReason};
use crate::ports::outbound::Clock;

/// Sweep `guard` every `interval` until the task is aborted.
pub async fn sweep_task(guard: Arc<ReplayGuard>, clock: Arc<dyn Clock>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let outcome = guard.sweep(clock.now_millis());
        bridge_telemetry::REPLAY_CACHE_ENTRIES.set(outcome.remaining as i64);

        if outcome.reason != SweepReason::Idle {
            tracing::debug!(
                evicted = outcome.evicted,
                remaining = outcome.remaining,
                reason = ?outcome.reason,
                "Replay cache sweep"
            );
        }
    }
}

/// Spawn [`sweep_task`] on the current tokio runtime.
///
/// Fails if there is no runtime on this thread.
pub fn spawn_sweeper(
    guard: Arc<ReplayGuard>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> Result<JoinHandle<()>, TryCurrentError> {
    let runtime = Handle::try_current()?;
    Ok(runtime.spawn(sweep_task(guard, clock, interval)))
}
