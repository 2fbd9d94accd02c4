use crate::error::StoreError;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A value that is either available now or produced by a future.
///
/// Stores, lenses and actions match on this instead of sniffing for
/// future-shaped values.
pub enum Value<T> {
    /// Available immediately.
    Immediate(T),
    /// Available once the future completes.
    Deferred(BoxFuture<'static, T>),
}

impl<T> Value<T> {
    /// Wrap a future as a deferred value.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Value::Deferred(future.boxed())
    }

    /// Whether the value still has to be awaited.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Value::Deferred(_))
    }

    /// Wait for the value.
    pub async fn resolve(self) -> T {
        match self {
            Value::Immediate(value) => value,
            Value::Deferred(future) => future.await,
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::Immediate(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Value::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// One-shot completion handle returned by `ready()`.
pub type Ready<T> = BoxFuture<'static, Result<T, StoreError>>;

/// Completion of a `publish_value` call.
pub type Publication = BoxFuture<'static, Result<(), StoreError>>;

/// Drives a store's deferred initializer to completion.
///
/// The library embeds no executor: spawn this on the runtime you use, or
/// await it directly. Dropping it abandons the initializer and leaves the
/// store Pending.
#[must_use = "hydration does nothing unless awaited or spawned"]
pub struct Hydration {
    inner: BoxFuture<'static, Result<(), StoreError>>,
}

impl Hydration {
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// A hydration that has nothing left to do.
    pub(crate) fn complete() -> Self {
        Self::new(future::ready(Ok(())))
    }
}

impl Future for Hydration {
    type Output = Result<(), StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Hydration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hydration(..)")
    }
}
