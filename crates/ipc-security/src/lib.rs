//! # IPC Security
//!
//! Authenticated message protocol for a privileged backend and a less-trusted
//! front-end that talk over a local call/response channel.
//!
//! ## Trust Model
//!
//! Every intercepted call must come from the application's own front-end
//! (origin check). Operations on the secure-channel list additionally
//! require a signed envelope:
//!
//! ```text
//! ┌──────────────┐  create_secure_message()  ┌──────────────────┐
//! │ Trusted side │ ────────────────────────▶ │  SecureMessage   │
//! └──────────────┘                           │ payload          │
//!                                            │ timestamp        │
//!                                            │ nonce            │
//!                                            │ signature (HMAC) │
//!                                            └────────┬─────────┘
//!                                                     │ transport
//!                                                     ▼
//!                  ┌──────────────────────────────────────────────┐
//!                  │ SecurityGateway                              │
//!                  │  origin → envelope → MAC → freshness → replay│
//!                  └──────────────────────┬───────────────────────┘
//!                                         ▼
//!                                  original handler
//! ```
//!
//! ## Security
//!
//! - **Per-process key:** 256-bit, held in memory only, zeroized at shutdown
//!   and on drop
//! - **Fail-closed teardown:** once shut down, every guarded call is rejected
//! - **Constant-time MAC comparison**
//! - **Time-indexed replay set:** nonces live as long as they could still
//!   pass the freshness check
//! - **Opaque rejections:** callers see one generic error, logs get the detail
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ipc_security::{SecurityConfig, SecurityGateway};
//!
//! let gateway = SecurityGateway::new(SecurityConfig::default())?;
//! let registry = gateway.secure_registry(transport);
//! registry.register_handler("auth:sign-in", sign_in_handler);
//! gateway.spawn_sweeper()?;
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::clock::{ManualClock, SystemClock};
pub use adapters::sweeper::spawn_sweeper;
pub use adapters::transport::{FrameCaller, InMemoryTransport};
pub use config::{ConfigError, SecurityConfig, MAX_CACHED_NONCES_LIMIT};
pub use domain::entities::{MacTag, Nonce, ReplayKey, SecureMessage, SecurityStats};
pub use domain::errors::{
    HandlerError, InvocationError, KeyError, SecurityViolation, ViolationKind,
};
pub use domain::keys::{KeyManager, RotationListener, SigningKey};
pub use domain::origin::{OriginRejection, OriginValidator};
pub use domain::policy::ChannelPolicy;
pub use domain::replay::{EvictionPolicy, ReplayGuard, ReplayGuardConfig, SweepOutcome, SweepReason};
pub use domain::signer::{canonical_json, MessageSigner};
pub use ports::inbound::SecureChannelApi;
pub use ports::outbound::{
    handler_fn, CallerHandle, Clock, HandlerRegistry, HandlerResult, IpcHandler,
};
pub use service::{GatewayError, GuardedHandler, SecuredRegistry, SecurityGateway};
