use super::value::{Publication, Ready, Value};
use super::watch::Watch;
use crate::channel::Subscription;
use crate::error::StoreError;
use futures::future;
use futures::FutureExt;

/// Read side of every store-shaped value.
///
/// Implemented by [`Store`](crate::Store), [`Computed`](crate::Computed),
/// [`Lens`](crate::Lens) and the decorating wrappers. A UI binding only
/// needs `current`/`unwrap` and `subscribe`.
pub trait Readable: Send + Sync {
    type Value: Clone + Send + Sync + 'static;

    /// The current value, or `None` while the store is still hydrating.
    fn current(&self) -> Option<Self::Value>;

    /// The current value.
    ///
    /// # Panics
    ///
    /// Panics if the store is still Pending. Await [`ready`](Self::ready)
    /// first when the store was created from a future.
    fn unwrap(&self) -> Self::Value {
        match self.current() {
            Some(value) => value,
            None => panic!("store read before hydration completed; await `ready()` first"),
        }
    }

    /// Whether a value is available, i.e. the store is no longer Pending.
    fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// Call `f` with the current value right away (once Ready), then with
    /// every published value until unsubscribed.
    ///
    /// `f` may publish back into the store it observes, but recursion is
    /// capped at [`MAX_PUBLISH_DEPTH`](crate::MAX_PUBLISH_DEPTH).
    fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&Self::Value) + Send + Sync + 'static;

    /// Resolves to the first Ready value, or immediately to the current one.
    fn ready(&self) -> Ready<Self::Value>;

    /// Stop notifying and drop every subscriber. Idempotent.
    fn close(&self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;

    /// A stream of values starting with the current one.
    fn watch(&self) -> Result<Watch<Self::Value>, StoreError>
    where
        Self: Sized,
    {
        Watch::new(self)
    }
}

/// Write side of a store-shaped value.
pub trait Writable: Readable {
    /// Replace the value and notify subscribers synchronously.
    ///
    /// A publish nested more than [`MAX_PUBLISH_DEPTH`](crate::MAX_PUBLISH_DEPTH)
    /// deep inside subscriber callbacks writes nothing and returns
    /// [`StoreError::RecursionLimit`].
    fn publish(&self, value: Self::Value) -> Result<(), StoreError>;

    /// Mutate a copy of the current value and publish it.
    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Self::Value),
        Self: Sized,
    {
        let mut next = self.current().ok_or(StoreError::NotReady)?;
        f(&mut next);
        self.publish(next)
    }

    /// Publish an immediate value now, or a deferred one once it resolves.
    ///
    /// A deferred value that resolves after the store was closed is
    /// discarded and the publication fails with [`StoreError::Closed`].
    fn publish_value(&self, value: Value<Self::Value>) -> Publication
    where
        Self: Clone + Sized + 'static,
    {
        match value {
            Value::Immediate(value) => future::ready(self.publish(value)).boxed(),
            Value::Deferred(pending) => {
                let target = self.clone();
                async move {
                    let value = pending.await;
                    if target.is_closed() {
                        tracing::warn!("deferred publish resolved after close; discarding");
                        return Err(StoreError::Closed);
                    }
                    target.publish(value)
                }
                .boxed()
            }
        }
    }
}
