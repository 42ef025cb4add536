//! # IPC Security Errors
//!
//! Two layers of errors live here:
//!
//! - [`SecurityViolation`]: the detailed internal taxonomy. It is logged
//!   locally and counted, never sent back across the trust boundary.
//! - [`InvocationError`]: what the calling surface receives. Every security
//!   failure collapses into the single [`InvocationError::Rejected`] variant,
//!   so error specificity cannot be used as an oracle for forging envelopes.

use thiserror::Error;

/// Internal classification of a security failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    /// Caller is not the application's own trusted surface.
    #[error("Origin rejected: {reason}")]
    OriginRejected { reason: String },

    /// Envelope missing, or one of its fields missing / wrong-typed.
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Timestamp older than the freshness window.
    #[error("Message expired: age {age_ms}ms exceeds {max_age_ms}ms")]
    MessageExpired { age_ms: u64, max_age_ms: u64 },

    /// Timestamp too far in the future.
    #[error("Clock skew rejected: {ahead_ms}ms ahead exceeds {max_skew_ms}ms")]
    ClockSkewRejected { ahead_ms: u64, max_skew_ms: u64 },

    /// The (timestamp, nonce) pair was already accepted once.
    #[error("Replay detected")]
    ReplayDetected,

    /// MAC mismatch under the current key, or no key at all.
    #[error("Invalid signature")]
    SignatureInvalid,

    /// The gateway was shut down; every call is refused.
    #[error("Gateway closed")]
    GatewayClosed,
}

impl SecurityViolation {
    /// Coarse label used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::OriginRejected { .. } => ViolationKind::OriginRejected,
            Self::MalformedEnvelope { .. } => ViolationKind::MalformedEnvelope,
            Self::MessageExpired { .. } => ViolationKind::MessageExpired,
            Self::ClockSkewRejected { .. } => ViolationKind::ClockSkewRejected,
            Self::ReplayDetected => ViolationKind::ReplayDetected,
            Self::SignatureInvalid => ViolationKind::SignatureInvalid,
            Self::GatewayClosed => ViolationKind::GatewayClosed,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }
}

/// Field-free counterpart of [`SecurityViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    OriginRejected,
    MalformedEnvelope,
    MessageExpired,
    ClockSkewRejected,
    ReplayDetected,
    SignatureInvalid,
    GatewayClosed,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OriginRejected => "origin_rejected",
            Self::MalformedEnvelope => "malformed_envelope",
            Self::MessageExpired => "message_expired",
            Self::ClockSkewRejected => "clock_skew_rejected",
            Self::ReplayDetected => "replay_detected",
            Self::SignatureInvalid => "signature_invalid",
            Self::GatewayClosed => "gateway_closed",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the business logic behind an operation.
///
/// Carries no security sensitivity, so it crosses the boundary unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable description
    pub message: String,
    /// Optional application-defined error code
    pub code: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Error returned to the caller of an intercepted operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// Any security failure. Deliberately carries no detail.
    #[error("request rejected")]
    Rejected,

    /// The handler ran and failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// No handler is registered under this name.
    #[error("no handler registered for '{name}'")]
    UnknownOperation { name: String },
}

/// Failure to produce key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The operating system entropy source failed.
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    /// The key was destroyed at shutdown.
    #[error("Signing key has been retired")]
    Retired,
}
