//! # Envelope Entities
//!
//! The authenticated envelope and the value types it is built from.
//!
//! On the wire the envelope is a JSON object with exactly four fields:
//!
//! ```text
//! {
//!   "payload":   <any JSON value>,
//!   "timestamp": <u64, milliseconds since the Unix epoch>,
//!   "nonce":     "<32 hex chars, 16 random bytes>",
//!   "signature": "<64 hex chars, HMAC-SHA256 tag>"
//! }
//! ```

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::errors::SecurityViolation;

/// Nonce length in bytes (128 bits of entropy).
pub const NONCE_LEN: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const MAC_LEN: usize = 32;

/// Single-use random token carried by every envelope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nonce(#[serde(with = "hex::serde")] pub [u8; NONCE_LEN]);

impl Nonce {
    /// Lowest possible nonce, used as a range bound.
    pub const MIN: Nonce = Nonce([0u8; NONCE_LEN]);

    /// Draw a fresh nonce from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// Keyed MAC over the canonical encoding of an envelope.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacTag(#[serde(with = "hex::serde")] pub [u8; MAC_LEN]);

impl MacTag {
    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }
}

impl fmt::Debug for MacTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacTag({})", hex::encode(self.0))
    }
}

/// The authenticated envelope.
///
/// Valid only if the MAC recomputed over its own `(payload, timestamp, nonce)`
/// under the current key equals `signature`, the timestamp is fresh, and the
/// `(timestamp, nonce)` pair has never been accepted before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureMessage {
    /// Opaque application data being protected.
    pub payload: Value,
    /// Milliseconds since the Unix epoch, set at signing time.
    pub timestamp: u64,
    pub nonce: Nonce,
    pub signature: MacTag,
}

impl SecureMessage {
    /// Parse an envelope out of an untyped invocation argument.
    ///
    /// Any missing or wrong-typed field yields `MalformedEnvelope`.
    pub fn from_value(value: &Value) -> Result<Self, SecurityViolation> {
        if !value.is_object() {
            return Err(SecurityViolation::malformed("envelope is not an object"));
        }
        Self::deserialize(value).map_err(|e| SecurityViolation::malformed(e.to_string()))
    }

    /// Serialize the envelope for transport.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "payload": self.payload,
            "timestamp": self.timestamp,
            "nonce": hex::encode(self.nonce.0),
            "signature": hex::encode(self.signature.0),
        })
    }

    /// Identity of this message in the replay guard.
    pub fn replay_key(&self) -> ReplayKey {
        ReplayKey {
            timestamp: self.timestamp,
            nonce: self.nonce,
        }
    }
}

/// Membership key of the replay guard.
///
/// Ordered by timestamp first so the accepted set doubles as a time index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplayKey {
    pub timestamp: u64,
    pub nonce: Nonce,
}

/// Diagnostics snapshot exposed to the trusted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStats {
    /// Operations that require the full envelope
    pub policed_channel_count: usize,
    /// Accepted (timestamp, nonce) pairs currently tracked
    pub cached_nonce_count: usize,
    /// Signing key length in bytes
    pub key_length: usize,
    /// Incremented on every rotation, starting at 0
    pub key_generation: u64,
}
