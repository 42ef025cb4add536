//! In-process call-dispatch transport.
//!
//! Stand-in for the host's real channel: one side registers named handlers,
//! the other invokes them with a caller handle and a list of JSON arguments.
//! Used by tests and by hosts that embed both ends in one process.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::errors::InvocationError;
use crate::ports::outbound::{CallerHandle, HandlerRegistry, HandlerResult, IpcHandler};

/// Named handler table with async dispatch.
#[derive(Default)]
pub struct InMemoryTransport {
    handlers: RwLock<HashMap<String, Arc<dyn IpcHandler>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch `operation` to its handler.
    pub async fn invoke(
        &self,
        caller: &dyn CallerHandle,
        operation: &str,
        args: Vec<Value>,
    ) -> HandlerResult {
        let handler = self.handlers.read().get(operation).cloned();
        match handler {
            Some(handler) => handler.handle(caller, args).await,
            None => Err(InvocationError::UnknownOperation {
                name: operation.to_string(),
            }),
        }
    }

    pub fn is_registered(&self, operation: &str) -> bool {
        self.handlers.read().contains_key(operation)
    }

    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl HandlerRegistry for InMemoryTransport {
    fn register_handler(&self, operation: &str, handler: Arc<dyn IpcHandler>) {
        self.handlers.write().insert(operation.to_string(), handler);
    }

    fn remove_handler(&self, operation: &str) -> bool {
        self.handlers.write().remove(operation).is_some()
    }
}

/// Caller handle for a document frame.
#[derive(Debug)]
pub struct FrameCaller {
    url: Option<String>,
    attached: AtomicBool,
}

impl FrameCaller {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            attached: AtomicBool::new(true),
        }
    }

    /// A caller with no document URL at all.
    pub fn without_origin() -> Self {
        Self {
            url: None,
            attached: AtomicBool::new(true),
        }
    }

    /// Simulate the frame being destroyed.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }
}

impl CallerHandle for FrameCaller {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn origin_url(&self) -> Option<String> {
        self.url.clone()
    }
}
