use super::sources::{Hook, Sources};
use crate::channel::Subscription;
use crate::error::StoreError;
use crate::store::{Readable, Ready, Store, Writable};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

trait Link: Send + Sync {
    fn detach(&self);
}

/// Parent subscriptions plus the combining function of one computed value.
struct Derivation<S, F, V> {
    store: Store<V>,
    sources: S,
    combine: F,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<S, F, V> Derivation<S, F, V> {
    fn detach_all(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl<S, F, V> Derivation<S, F, V>
where
    S: Sources,
    F: Fn(S::Values) -> V + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn recompute(&self) {
        let Some(values) = self.sources.values() else {
            tracing::trace!("a source is pending; skipping recompute");
            return;
        };
        if let Err(err) = self.store.publish((self.combine)(values)) {
            tracing::error!(error = %err, "failed to publish computed value");
        }
    }
}

impl<S, F, V> Link for Derivation<S, F, V>
where
    S: Sources,
    F: Fn(S::Values) -> V + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn detach(&self) {
        self.detach_all();
    }
}

impl<S, F, V> Drop for Derivation<S, F, V> {
    fn drop(&mut self) {
        self.detach_all();
    }
}

/// A read-only value derived from one to five parents.
///
/// The combining function runs once at construction and again every time
/// any parent publishes, with no equality check. There is no `publish`:
/// only recomputation writes to a computed value.
///
/// Parents are held as shared handles and never closed by the computed
/// value. Dropping every handle to the computed value stops recomputation.
///
/// # Example
///
/// ```
/// use spellkit::{Computed, Readable, Store, Writable};
///
/// let a = Store::new(0);
/// let b = Store::new(0);
/// let sum = Computed::new((a.clone(), b.clone()), |(x, y)| x + y).unwrap();
///
/// a.publish(2).unwrap();
/// b.publish(3).unwrap();
/// assert_eq!(sum.unwrap(), 5);
/// ```
pub struct Computed<V> {
    store: Store<V>,
    link: Arc<dyn Link>,
}

impl<V: Clone + Send + Sync + 'static> Computed<V> {
    /// Derive a value from `sources` through `combine`.
    ///
    /// Fails with [`StoreError::NotReady`] if a parent is still Pending, or
    /// with [`StoreError::Closed`] if a parent has been closed.
    pub fn new<S, F>(sources: S, combine: F) -> Result<Self, StoreError>
    where
        S: Sources,
        F: Fn(S::Values) -> V + Send + Sync + 'static,
    {
        let initial = sources.values().ok_or(StoreError::NotReady)?;
        let store = Store::new(combine(initial));

        let mut failure = None;
        // The parents replay on subscribe; the weak handle cannot upgrade
        // until construction finishes, so those replays are skipped.
        let derivation = Arc::new_cyclic(|weak: &Weak<Derivation<S, F, V>>| {
            let weak = weak.clone();
            let hook: Hook = Arc::new(move || {
                if let Some(derivation) = weak.upgrade() {
                    derivation.recompute();
                }
            });
            let subscriptions = sources.subscribe_each(&hook).unwrap_or_else(|err| {
                failure = Some(err);
                Vec::new()
            });
            Derivation {
                store: store.clone(),
                sources,
                combine,
                subscriptions: Mutex::new(subscriptions),
            }
        });

        if let Some(err) = failure {
            store.close();
            return Err(err);
        }
        Ok(Self {
            store,
            link: derivation,
        })
    }
}

impl<V: Clone + Send + Sync + 'static> Readable for Computed<V> {
    type Value = V;

    fn current(&self) -> Option<V> {
        self.store.current()
    }

    fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.store.subscribe(f)
    }

    fn ready(&self) -> Ready<V> {
        self.store.ready()
    }

    /// Stop recomputing and close the computed value's own channel.
    fn close(&self) {
        self.link.detach();
        self.store.close();
    }

    fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl<V> Clone for Computed<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            link: Arc::clone(&self.link),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Computed<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed").field("store", &self.store).finish()
    }
}
