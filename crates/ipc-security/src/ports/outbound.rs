//! # Outbound Ports (Driven Ports / SPI)
//!
//! What the security layer needs from its host: a clock, a way to inspect
//! the caller of an invocation, and the transport's handler registration.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::domain::errors::InvocationError;

/// Result of one operation invocation.
pub type HandlerResult = Result<Value, InvocationError>;

/// Wall-clock source, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The transport's view of who issued an invocation.
pub trait CallerHandle: Send + Sync {
    /// `false` once the calling surface has been destroyed or detached.
    fn is_attached(&self) -> bool;

    /// URL of the document that issued the call, if any.
    fn origin_url(&self) -> Option<String>;
}

/// A named-operation handler as the transport dispatches it.
#[async_trait]
pub trait IpcHandler: Send + Sync {
    async fn handle(&self, caller: &dyn CallerHandle, args: Vec<Value>) -> HandlerResult;
}

/// Registration side of the call-dispatch transport.
pub trait HandlerRegistry: Send + Sync {
    /// Install `handler` under `operation`, replacing any previous one.
    fn register_handler(&self, operation: &str, handler: Arc<dyn IpcHandler>);

    /// Returns `false` if nothing was registered under `operation`.
    fn remove_handler(&self, operation: &str) -> bool;
}

/// Lets a shared transport be registered through directly.
impl<T: HandlerRegistry + ?Sized> HandlerRegistry for Arc<T> {
    fn register_handler(&self, operation: &str, handler: Arc<dyn IpcHandler>) {
        (**self).register_handler(operation, handler);
    }

    fn remove_handler(&self, operation: &str) -> bool {
        (**self).remove_handler(operation)
    }
}

/// Handler built from an async closure over the call arguments.
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> IpcHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, _caller: &dyn CallerHandle, args: Vec<Value>) -> HandlerResult {
        (self.f)(args).await
    }
}

/// Wrap an async closure as an [`IpcHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn IpcHandler>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
