//! # Channel Policy
//!
//! Explicit allowlist of operations that require the full authenticated
//! envelope. Operations not listed here get the origin check only, so a new
//! sensitive operation is unprotected until it is added.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Operations policed from startup: sign-in, sign-up, AI session
/// negotiation and persisted-record mutation.
pub const DEFAULT_SECURE_CHANNELS: &[&str] = &[
    "auth:sign-in",
    "auth:sign-up",
    "ai:negotiate-session",
    "db:save-record",
    "db:delete-record",
];

/// Mutable set of policed operation names.
#[derive(Debug, Default)]
pub struct ChannelPolicy {
    channels: RwLock<HashSet<String>>,
}

impl ChannelPolicy {
    pub fn new<I>(channels: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            channels: RwLock::new(channels.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SECURE_CHANNELS.iter().copied())
    }

    pub fn requires_envelope(&self, operation: &str) -> bool {
        self.channels.read().contains(operation)
    }

    /// Returns `false` if the operation was already policed.
    pub fn add(&self, operation: &str) -> bool {
        let added = self.channels.write().insert(operation.to_string());
        if added {
            tracing::info!(channel = operation, action = "add", "Secure channel policy updated");
        }
        added
    }

    /// Returns `false` if the operation was not policed.
    pub fn remove(&self, operation: &str) -> bool {
        let removed = self.channels.write().remove(operation);
        if removed {
            tracing::info!(channel = operation, action = "remove", "Secure channel policy updated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Policed operations in sorted order.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.read().iter().cloned().collect();
        channels.sort();
        channels
    }
}
