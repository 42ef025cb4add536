//! # Shared Fixtures
//!
//! A complete in-process bridge: a gateway on a manual clock, an in-memory
//! transport registered through the gateway's secured registry, and a set of
//! recording handlers for the operations a typical desktop app exposes.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use ipc_security::{
    handler_fn, FrameCaller, HandlerError, HandlerRegistry, HandlerResult, InMemoryTransport,
    ManualClock, SecurityConfig, SecurityGateway,
};

/// Fixed start time for deterministic tests.
pub const T0: u64 = 1_700_000_000_000;

/// Document URL of the application's own front-end.
pub const TRUSTED_URL: &str = "app://./index.html";

/// Operations registered on every [`Bridge`].
pub const OPERATIONS: &[&str] = &[
    "auth:sign-in",
    "auth:sign-up",
    "ai:negotiate-session",
    "db:save-record",
    "db:delete-record",
    "app:get-version",
    "app:get-theme",
];

/// One handler invocation as the business logic saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub args: Vec<Value>,
}

pub struct Bridge {
    pub gateway: SecurityGateway,
    pub transport: Arc<InMemoryTransport>,
    pub clock: Arc<ManualClock>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Bridge {
    pub fn new() -> Self {
        Self::with_config(SecurityConfig::default())
    }

    pub fn with_config(config: SecurityConfig) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let gateway = SecurityGateway::with_clock(config, clock.clone())
            .expect("fixture config is valid");
        let transport = Arc::new(InMemoryTransport::new());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let registry = gateway.secure_registry(transport.clone());
        for operation in OPERATIONS {
            registry.register_handler(operation, recording_handler(operation, calls.clone()));
        }

        Self {
            gateway,
            transport,
            clock,
            calls,
        }
    }

    pub fn trusted_caller(&self) -> FrameCaller {
        FrameCaller::new(TRUSTED_URL)
    }

    /// Invoke the way the real front-end does: wrap if policed, then call.
    pub async fn call(&self, operation: &str, payload: Value) -> HandlerResult {
        let args = self
            .gateway
            .prepare_args(operation, vec![payload])
            .expect("fixture gateway is live");
        self.transport
            .invoke(&self.trusted_caller(), operation, args)
            .await
    }

    /// Invoke with hand-built arguments, skipping envelope creation.
    pub async fn call_raw(
        &self,
        caller: &FrameCaller,
        operation: &str,
        args: Vec<Value>,
    ) -> HandlerResult {
        self.transport.invoke(caller, operation, args).await
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Echoes `{operation, payload}` back. `auth:sign-in` fails with a handler
/// error when the payload carries `"password": "wrong"`.
fn recording_handler(
    operation: &str,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
) -> Arc<dyn ipc_security::IpcHandler> {
    let operation = operation.to_string();
    handler_fn(move |args: Vec<Value>| {
        let operation = operation.clone();
        let calls = calls.clone();
        async move {
            calls.lock().push(RecordedCall {
                operation: operation.clone(),
                args: args.clone(),
            });

            let payload = args.first().cloned().unwrap_or(Value::Null);
            if operation == "auth:sign-in" && payload["password"] == json!("wrong") {
                return Err(HandlerError::with_code("E_CREDENTIALS", "invalid email or password").into());
            }

            HandlerResult::Ok(json!({ "operation": operation, "payload": payload }))
        }
    })
}
