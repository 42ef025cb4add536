//! # Security Gateway
//!
//! Application service that intercepts every operation registration on the
//! transport and runs the per-call state machine:
//!
//! ```text
//! RECEIVED → ORIGIN_CHECK → {REJECTED | CONTINUE}
//! CONTINUE → policed? → ENVELOPE_UNWRAP → VERIFY → {REJECTED | ACCEPTED}
//! CONTINUE → not policed → ACCEPTED
//! ACCEPTED → handler → RESULT | HANDLER_ERROR
//! ```
//!
//! ## Verification Order
//!
//! 0. Gateway still open (every call)
//! 1. Origin (every call, policed or not)
//! 2. Envelope shape
//! 3. MAC under the active key
//! 4. Freshness window and future skew
//! 5. Replay set test-and-insert
//!
//! Steps 3 to 5 run under the key read lock, so a rotation cannot land
//! between the MAC check and the nonce insert. A forged envelope fails at
//! step 3 and never occupies a replay slot.
//!
//! Every security failure is logged and counted with its detail, then
//! surfaced to the caller as [`InvocationError::Rejected`].
//!
//! ## Teardown
//!
//! [`SecurityGateway::shutdown`] and `Drop` run the same teardown. Handlers
//! already registered on the transport outlive the gateway, so teardown
//! closes the shared core and every later call is rejected. The key is
//! zeroized on the way out.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::adapters::clock::SystemClock;
use crate::adapters::sweeper;
use crate::config::{ConfigError, SecurityConfig};
use crate::domain::entities::{SecureMessage, SecurityStats};
use crate::domain::errors::{InvocationError, KeyError, SecurityViolation};
use crate::domain::keys::{KeyManager, SigningKey};
use crate::domain::origin::OriginValidator;
use crate::domain::policy::ChannelPolicy;
use crate::domain::replay::{ReplayGuard, SweepOutcome};
use crate::domain::signer::{verify_with_key, MessageSigner};
use crate::ports::inbound::SecureChannelApi;
use crate::ports::outbound::{CallerHandle, Clock, HandlerRegistry, HandlerResult, IpcHandler};

/// Gateway construction and lifecycle errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Key(#[from] KeyError),

    /// No tokio runtime to run the sweeper on.
    #[error("No tokio runtime available: {0}")]
    Runtime(String),

    /// The gateway has been shut down.
    #[error("Security gateway is shut down")]
    Closed,
}

/// State shared by the gateway and every handler it wraps.
struct GatewayCore {
    keys: Arc<KeyManager>,
    signer: MessageSigner,
    replay: Arc<ReplayGuard>,
    origin: OriginValidator,
    policy: ChannelPolicy,
    clock: Arc<dyn Clock>,
    shut_down: AtomicBool,
}

impl GatewayCore {
    /// Run the checks for one call. On success `args[0]` holds the bare
    /// payload if the operation is policed. Returns whether it was policed.
    fn admit(
        &self,
        operation: &str,
        caller: &dyn CallerHandle,
        args: &mut [Value],
    ) -> Result<bool, SecurityViolation> {
        if self.is_shut_down() {
            return Err(SecurityViolation::GatewayClosed);
        }
        self.origin.check(caller)?;

        if !self.policy.requires_envelope(operation) {
            return Ok(false);
        }

        let envelope = args
            .first_mut()
            .ok_or_else(|| SecurityViolation::malformed("missing envelope argument"))?;
        let payload = self.open(SecureMessage::from_value(envelope)?)?;
        *envelope = payload;

        Ok(true)
    }

    /// MAC, freshness, then replay, all under one key read lock.
    /// A retired key verifies nothing.
    fn open(&self, message: SecureMessage) -> Result<Value, SecurityViolation> {
        self.keys
            .with_active_key(|key| {
                verify_with_key(key, &message)?;
                self.replay
                    .check_and_record(message.timestamp, message.nonce, self.clock.now_millis())
            })
            .unwrap_or(Err(SecurityViolation::SignatureInvalid))?;
        Ok(message.payload)
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Close the core for good. Returns `false` if it was already closed.
    fn close(&self) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.keys.retire();
        let evicted = self.replay.clear();
        self.publish_cache_size();
        bridge_telemetry::log_security_event!(info, "Security gateway shut down", evicted = evicted);
        true
    }

    fn reject(&self, operation: &str, violation: &SecurityViolation) {
        let kind = violation.kind();
        bridge_telemetry::log_security_event!(
            warn,
            "IPC call rejected",
            operation = %operation,
            kind = %kind,
            detail = %violation
        );
        bridge_telemetry::metric_inc!(bridge_telemetry::REJECTIONS, &[kind.as_str()]);
    }

    fn publish_cache_size(&self) {
        bridge_telemetry::REPLAY_CACHE_ENTRIES.set(self.replay.len() as i64);
    }
}

/// Handler returned by [`SecurityGateway::wrap_registration`].
///
/// The wrapped handler receives the same arguments it would have received
/// unwrapped, except that a policed call's envelope is replaced by its payload.
pub struct GuardedHandler {
    operation: String,
    inner: Arc<dyn IpcHandler>,
    core: Arc<GatewayCore>,
}

#[async_trait]
impl IpcHandler for GuardedHandler {
    async fn handle(&self, caller: &dyn CallerHandle, mut args: Vec<Value>) -> HandlerResult {
        let policed = match self.core.admit(&self.operation, caller, &mut args) {
            Ok(policed) => policed,
            Err(violation) => {
                self.core.reject(&self.operation, &violation);
                return Err(InvocationError::Rejected);
            }
        };

        let label = if policed { "true" } else { "false" };
        bridge_telemetry::metric_inc!(bridge_telemetry::CALLS_ACCEPTED, &[label]);
        if policed {
            self.core.publish_cache_size();
        }
        tracing::debug!(operation = %self.operation, policed, "IPC call accepted");

        self.inner.handle(caller, args).await
    }
}

/// [`HandlerRegistry`] decorator that guards every registration.
///
/// Hand this to code that registers handlers instead of the raw transport;
/// the handlers themselves never see the security layer.
pub struct SecuredRegistry<R> {
    inner: R,
    core: Arc<GatewayCore>,
}

impl<R: HandlerRegistry> SecuredRegistry<R> {
    /// The undecorated registry.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: HandlerRegistry> HandlerRegistry for SecuredRegistry<R> {
    fn register_handler(&self, operation: &str, handler: Arc<dyn IpcHandler>) {
        self.inner
            .register_handler(operation, guard(&self.core, operation, handler));
    }

    fn remove_handler(&self, operation: &str) -> bool {
        self.inner.remove_handler(operation)
    }
}

fn guard(core: &Arc<GatewayCore>, operation: &str, handler: Arc<dyn IpcHandler>) -> Arc<dyn IpcHandler> {
    Arc::new(GuardedHandler {
        operation: operation.to_string(),
        inner: handler,
        core: Arc::clone(core),
    })
}

/// Security Gateway.
///
/// Owns the signing key, the replay set, the origin rules and the channel
/// policy. Dropping it has the same effect as [`SecurityGateway::shutdown`].
pub struct SecurityGateway {
    core: Arc<GatewayCore>,
    sweep_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SecurityGateway {
    /// Create a gateway on the system clock with a freshly generated key.
    pub fn new(config: SecurityConfig) -> Result<Self, GatewayError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SecurityConfig, clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        config.validate()?;
        let keys = KeyManager::generate()?;
        Ok(Self::assemble(&config, keys, clock))
    }

    /// Create a gateway around existing key material.
    pub fn with_key(
        config: SecurityConfig,
        key: SigningKey,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self::assemble(&config, KeyManager::with_key(key), clock))
    }

    fn assemble(config: &SecurityConfig, keys: KeyManager, clock: Arc<dyn Clock>) -> Self {
        let keys = Arc::new(keys);
        let replay = Arc::new(ReplayGuard::new(config.replay_guard_config()));
        keys.subscribe(replay.clone());

        let core = GatewayCore {
            signer: MessageSigner::new(keys.clone(), clock.clone()),
            keys,
            replay,
            origin: OriginValidator::new(&config.trusted_schemes, &config.dev_origins),
            policy: ChannelPolicy::new(config.secure_channels.iter().cloned()),
            clock,
            shut_down: AtomicBool::new(false),
        };

        bridge_telemetry::log_security_event!(
            info,
            "Security gateway ready",
            policed_channels = core.policy.len(),
            eviction = ?config.eviction
        );

        Self {
            core: Arc::new(core),
            sweep_interval: config.sweep_interval(),
            sweeper: Mutex::new(None),
        }
    }

    /// Wrap `handler` so every invocation of `operation` passes the checks
    /// before reaching it.
    pub fn wrap_registration(
        &self,
        operation: &str,
        handler: Arc<dyn IpcHandler>,
    ) -> Arc<dyn IpcHandler> {
        guard(&self.core, operation, handler)
    }

    /// Decorate a transport registry so all registrations are wrapped.
    pub fn secure_registry<R: HandlerRegistry>(&self, inner: R) -> SecuredRegistry<R> {
        SecuredRegistry {
            inner,
            core: Arc::clone(&self.core),
        }
    }

    /// Build the argument list for invoking `operation` from the trusted side.
    ///
    /// For a policed operation the first argument is replaced by a signed
    /// envelope around it (an envelope around `null` if `args` is empty).
    /// Other operations get their arguments back unchanged.
    pub fn prepare_args(
        &self,
        operation: &str,
        mut args: Vec<Value>,
    ) -> Result<Vec<Value>, KeyError> {
        if !self.core.policy.requires_envelope(operation) {
            return Ok(args);
        }

        if args.is_empty() {
            args.push(Value::Null);
        }
        let payload = args[0].take();
        args[0] = self.core.signer.sign(payload)?.to_value();
        Ok(args)
    }

    /// Verify an envelope and consume its nonce, yielding the payload.
    ///
    /// Performs the same checks as a policed call, minus the origin check.
    pub fn verify_message(&self, message: SecureMessage) -> Result<Value, SecurityViolation> {
        let result = self.core.open(message);
        self.core.publish_cache_size();
        result
    }

    /// Run one eviction pass now.
    pub fn sweep_now(&self) -> SweepOutcome {
        let outcome = self.core.replay.sweep(self.core.clock.now_millis());
        self.core.publish_cache_size();
        outcome
    }

    /// Start the periodic sweeper on the current tokio runtime.
    ///
    /// Does nothing if a sweeper is already running. Fails outside a tokio
    /// runtime and after shutdown.
    pub fn spawn_sweeper(&self) -> Result<(), GatewayError> {
        let mut slot = self.sweeper.lock();
        if self.core.is_shut_down() {
            return Err(GatewayError::Closed);
        }
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let handle = sweeper::spawn_sweeper(
            self.core.replay.clone(),
            self.core.clock.clone(),
            self.sweep_interval,
        )
        .map_err(|e| GatewayError::Runtime(e.to_string()))?;
        *slot = Some(handle);
        tracing::debug!(interval_ms = self.sweep_interval.as_millis() as u64, "Replay sweeper started");
        Ok(())
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Tear the gateway down.
    ///
    /// The key is zeroized and the replay set emptied. Every guarded
    /// handler rejects from then on, including those still registered on
    /// the transport. Calling it again does nothing.
    pub fn shutdown(&self) {
        let mut slot = self.sweeper.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        self.core.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.core.is_shut_down()
    }

    /// Operations currently policed, sorted.
    pub fn secure_channels(&self) -> Vec<String> {
        self.core.policy.channels()
    }

    pub fn requires_envelope(&self, operation: &str) -> bool {
        self.core.policy.requires_envelope(operation)
    }
}

impl SecureChannelApi for SecurityGateway {
    fn create_secure_message(&self, payload: Value) -> Result<SecureMessage, KeyError> {
        self.core.signer.sign(payload)
    }

    fn add_secure_channel(&self, operation: &str) -> bool {
        self.core.policy.add(operation)
    }

    fn remove_secure_channel(&self, operation: &str) -> bool {
        self.core.policy.remove(operation)
    }

    fn rotate_key(&self) -> Result<u64, KeyError> {
        let generation = self.core.keys.rotate()?;
        bridge_telemetry::metric_inc!(bridge_telemetry::KEY_ROTATIONS);
        self.core.publish_cache_size();
        Ok(generation)
    }

    fn security_stats(&self) -> SecurityStats {
        SecurityStats {
            policed_channel_count: self.core.policy.len(),
            cached_nonce_count: self.core.replay.len(),
            key_length: self.core.keys.key_length(),
            key_generation: self.core.keys.generation(),
        }
    }
}

impl Drop for SecurityGateway {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
        self.core.close();
    }
}
