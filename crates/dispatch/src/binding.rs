//! Operation implementations and their primary/fallback pairing

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

/// Boxed future returned by `Operation::invoke`.
pub type OperationFuture = Pin<Box<dyn Future<Output = transport::Result<Value>> + Send>>;

/// One implementation of a named operation: JSON arguments in, JSON out.
///
/// Boxed futures keep the trait dyn-compatible (`Arc<dyn Operation>`).
/// Any `Fn(Value) -> impl Future` closure is an `Operation`.
pub trait Operation: Send + Sync {
    fn invoke(&self, args: Value) -> OperationFuture;
}

impl<F, Fut> Operation for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = transport::Result<Value>> + Send + 'static,
{
    fn invoke(&self, args: Value) -> OperationFuture {
        Box::pin(self(args))
    }
}

/// A name bound to its (primary, fallback) pair. Immutable once built.
#[derive(Clone)]
pub struct OperationBinding {
    name: String,
    primary: Arc<dyn Operation>,
    fallback: Arc<dyn Operation>,
}

impl OperationBinding {
    pub fn new(
        name: impl Into<String>,
        primary: impl Operation + 'static,
        fallback: impl Operation + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            primary: Arc::new(primary),
            fallback: Arc::new(fallback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary(&self) -> &Arc<dyn Operation> {
        &self.primary
    }

    pub fn fallback(&self) -> &Arc<dyn Operation> {
        &self.fallback
    }
}

impl std::fmt::Debug for OperationBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
