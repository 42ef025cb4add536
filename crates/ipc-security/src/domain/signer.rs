//! # Message Signer
//!
//! HMAC-SHA256 over a canonical encoding of `(payload, timestamp, nonce)`.
//!
//! ## Canonical Encoding
//!
//! ```text
//! DOMAIN_TAG
//! ‖ u64_be(len(canonical_json(payload))) ‖ canonical_json(payload)
//! ‖ u64_be(timestamp)
//! ‖ nonce (16 bytes)
//! ```
//!
//! `canonical_json` is compact JSON with object keys sorted bytewise at every
//! depth, so two payloads that differ only in key insertion order produce the
//! same bytes.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::entities::{MacTag, Nonce, SecureMessage, MAC_LEN};
use super::errors::{KeyError, SecurityViolation};
use super::keys::{KeyManager, SigningKey};
use crate::ports::outbound::Clock;

type HmacSha256 = Hmac<Sha256>;

/// Separates these MACs from any other use of the same key.
const DOMAIN_TAG: &[u8] = b"secure-bridge/ipc-envelope/v1";

/// Signs and verifies envelopes with the key held by a [`KeyManager`].
pub struct MessageSigner {
    keys: Arc<KeyManager>,
    clock: Arc<dyn Clock>,
}

impl MessageSigner {
    pub fn new(keys: Arc<KeyManager>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Wrap `payload` in a freshly stamped, signed envelope.
    ///
    /// Fails with [`KeyError::Retired`] after the key has been destroyed.
    pub fn sign(&self, payload: Value) -> Result<SecureMessage, KeyError> {
        let timestamp = self.clock.now_millis();
        let nonce = Nonce::random();
        let signature = self
            .keys
            .with_active_key(|key| compute_tag(key, &payload, timestamp, &nonce))?;

        Ok(SecureMessage {
            payload,
            timestamp,
            nonce,
            signature,
        })
    }

    /// Recompute the MAC under the current key and compare in constant time.
    ///
    /// Only the signature is checked here; freshness and replay belong to
    /// the replay guard. Without a key nothing verifies.
    pub fn verify(&self, message: &SecureMessage) -> Result<(), SecurityViolation> {
        self.keys
            .with_active_key(|key| verify_with_key(key, message))
            .unwrap_or(Err(SecurityViolation::SignatureInvalid))
    }
}

/// Compute the envelope MAC under `key`.
pub(crate) fn compute_tag(
    key: &SigningKey,
    payload: &Value,
    timestamp: u64,
    nonce: &Nonce,
) -> MacTag {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");

    let payload_bytes = canonical_json(payload);

    mac.update(DOMAIN_TAG);
    mac.update(&(payload_bytes.len() as u64).to_be_bytes());
    mac.update(&payload_bytes);
    mac.update(&timestamp.to_be_bytes());
    mac.update(nonce.as_bytes());

    let mut tag = [0u8; MAC_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    MacTag(tag)
}

/// MAC check against an explicit key.
pub(crate) fn verify_with_key(
    key: &SigningKey,
    message: &SecureMessage,
) -> Result<(), SecurityViolation> {
    let expected = compute_tag(key, &message.payload, message.timestamp, &message.nonce);

    if bool::from(expected.as_bytes()[..].ct_eq(&message.signature.as_bytes()[..])) {
        Ok(())
    } else {
        Err(SecurityViolation::SignatureInvalid)
    }
}

/// Deterministic compact JSON with sorted object keys.
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(b':');
                write_canonical(item, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    out.extend_from_slice(value.to_string().as_bytes());
}
