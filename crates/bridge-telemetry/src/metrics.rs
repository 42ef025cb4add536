//! Prometheus metrics for the IPC security layer.
//!
//! All metrics follow the naming convention: `bridge_ipc_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Calls that passed every check, split by whether an envelope was required
    pub static ref CALLS_ACCEPTED: IntCounterVec = IntCounterVec::new(
        Opts::new("bridge_ipc_calls_accepted_total", "Intercepted calls that reached their handler"),
        &["policed"]
    ).expect("metric creation failed");

    /// Rejected calls, split by failure kind
    pub static ref REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("bridge_ipc_rejections_total", "Intercepted calls rejected by a security check"),
        &["kind"]
    ).expect("metric creation failed");

    /// Entries currently held by the replay guard
    pub static ref REPLAY_CACHE_ENTRIES: IntGauge = IntGauge::new(
        "bridge_ipc_replay_cache_entries",
        "Accepted (timestamp, nonce) pairs currently tracked"
    ).expect("metric creation failed");

    /// Signing key rotations
    pub static ref KEY_ROTATIONS: IntCounter = IntCounter::new(
        "bridge_ipc_key_rotations_total",
        "Number of signing key rotations"
    ).expect("metric creation failed");
}

/// Outcome of the one registration attempt, failure included.
static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

/// Handle proving the metrics were registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry.
///
/// Only the first call registers. Later calls report the same outcome, so a
/// failed registration keeps failing.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    memoized(&REGISTERED, || register_into(&REGISTRY))
}

fn memoized(
    cell: &OnceLock<Result<(), String>>,
    init: impl FnOnce() -> prometheus::Result<()>,
) -> Result<MetricsHandle, TelemetryError> {
    cell.get_or_init(|| init().map_err(|e| e.to_string()))
        .clone()
        .map(|()| MetricsHandle { _private: () })
        .map_err(TelemetryError::MetricsInit)
}

fn register_into(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(CALLS_ACCEPTED.clone()))?;
    registry.register(Box::new(REJECTIONS.clone()))?;
    registry.register(Box::new(REPLAY_CACHE_ENTRIES.clone()))?;
    registry.register(Box::new(KEY_ROTATIONS.clone()))?;
    Ok(())
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
