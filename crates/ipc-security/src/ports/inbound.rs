//! # Inbound Ports (Driving Ports / API)
//!
//! The surface the trusted application drives: envelope creation, policy
//! configuration, key lifecycle and diagnostics.

use serde_json::Value;

use crate::domain::entities::{SecureMessage, SecurityStats};
use crate::domain::errors::KeyError;

/// Management API of the security layer.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait SecureChannelApi: Send + Sync {
    /// Build a signed envelope around `payload` for a policed operation.
    ///
    /// Fails once the signing key has been retired.
    fn create_secure_message(&self, payload: Value) -> Result<SecureMessage, KeyError>;

    /// Require the full envelope for `operation` from now on.
    fn add_secure_channel(&self, operation: &str) -> bool;

    /// Drop `operation` back to origin-only checking.
    fn remove_secure_channel(&self, operation: &str) -> bool;

    /// Replace the signing key.
    ///
    /// Every envelope signed before this call stops verifying, including
    /// envelopes still in flight. Callers must re-create them.
    fn rotate_key(&self) -> Result<u64, KeyError>;

    /// Diagnostics snapshot.
    fn security_stats(&self) -> SecurityStats;
}
