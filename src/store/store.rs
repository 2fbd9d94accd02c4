use super::value::{Hydration, Ready, Value};
use super::{Readable, Writable};
use crate::channel::{Callback, Channel, Subscription};
use crate::error::{BoxError, StoreError};
use futures::channel::oneshot;
use futures::future;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type Waiter<T> = oneshot::Sender<Result<T, StoreError>>;

/// Whether a store has reached its first value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationState {
    /// Created from a future that has not resolved yet.
    Pending,
    /// A value is available.
    Ready,
}

struct StoreInner<T> {
    value: RwLock<Option<T>>,
    channel: Channel<T>,
    // Lock order: waiters, then value or channel.
    waiters: Mutex<Vec<Waiter<T>>>,
}

/// A channel that remembers its last value.
///
/// New subscribers are called with the current value before `subscribe`
/// returns. Cloning a store yields another handle to the same value.
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    /// Create a Ready store holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::with_slot(Some(initial))
    }

    /// Create a Ready store from the value `init` returns.
    pub fn from_fn<F>(init: F) -> Self
    where
        F: FnOnce() -> T,
    {
        Self::new(init())
    }

    /// Create a Pending store that becomes Ready on its first publish.
    pub fn pending() -> Self {
        Self::with_slot(None)
    }

    /// Create a Pending store hydrated by `init`.
    ///
    /// The returned [`Hydration`] must be awaited or spawned; when it
    /// completes the value is published and `ready()` waiters resolve.
    pub fn deferred<Fut>(init: Fut) -> (Self, Hydration)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let store = Self::pending();
        let target = store.clone();
        let hydration = Hydration::new(async move {
            let value = init.await;
            target.complete_hydration(value)
        });
        (store, hydration)
    }

    /// Like [`deferred`](Self::deferred), for initializers that can fail.
    ///
    /// On failure the `ready()` waiters are rejected with
    /// [`StoreError::Hydration`] and the store stays Pending; a later
    /// publish still makes it Ready.
    pub fn try_deferred<Fut, E>(init: Fut) -> (Self, Hydration)
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let store = Self::pending();
        let target = store.clone();
        let hydration = Hydration::new(async move {
            match init.await {
                Ok(value) => target.complete_hydration(value),
                Err(err) => {
                    let err: BoxError = err.into();
                    tracing::warn!(error = %err, "store hydration failed");
                    let message = err.to_string();
                    target.settle_waiters(|| Err(StoreError::Hydration(message.clone().into())));
                    Err(StoreError::Hydration(err))
                }
            }
        });
        (store, hydration)
    }

    /// Create a store from an immediate or deferred value.
    pub fn from_value(value: Value<T>) -> (Self, Hydration) {
        match value {
            Value::Immediate(value) => (Self::new(value), Hydration::complete()),
            Value::Deferred(init) => Self::deferred(init),
        }
    }

    /// Pending until the first value is written, Ready afterwards.
    pub fn state(&self) -> HydrationState {
        if self.inner.value.read().is_some() {
            HydrationState::Ready
        } else {
            HydrationState::Pending
        }
    }

    /// Read the state without cloning it.
    ///
    /// `f` runs under the store's read lock and must not publish.
    pub fn read<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.value.read().as_ref().map(f)
    }

    /// Number of live subscriptions, including derived values and watches.
    pub fn subscriber_count(&self) -> usize {
        self.inner.channel.subscriber_count()
    }

    fn with_slot(value: Option<T>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                value: RwLock::new(value),
                channel: Channel::new(),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    fn complete_hydration(&self, value: T) -> Result<(), StoreError> {
        if self.is_closed() {
            tracing::warn!("store closed before hydration resolved; discarding value");
            return Err(StoreError::Closed);
        }
        self.publish(value)?;
        tracing::debug!("store hydrated");
        Ok(())
    }

    fn settle_waiters(&self, outcome: impl Fn() -> Result<T, StoreError>) {
        let waiters = std::mem::take(&mut *self.inner.waiters.lock());
        for waiter in waiters {
            let _ = waiter.send(outcome());
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Readable for Store<T> {
    type Value = T;

    fn current(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let callback: Callback<T> = Arc::new(f);
        // Pending stores skip the replay; the hydrating publish reaches `f`.
        if let Some(current) = self.current() {
            callback(&current);
        }
        self.inner.channel.subscribe_callback(callback)
    }

    fn ready(&self) -> Ready<T> {
        let mut waiters = self.inner.waiters.lock();
        if let Some(value) = self.inner.value.read().clone() {
            return future::ready(Ok(value)).boxed();
        }
        if self.inner.channel.is_closed() {
            return future::ready(Err(StoreError::Closed)).boxed();
        }
        let (sender, receiver) = oneshot::channel();
        waiters.push(sender);
        async move { receiver.await.unwrap_or(Err(StoreError::Closed)) }.boxed()
    }

    /// Close the store. Pending `ready()` waiters are rejected with
    /// [`StoreError::Closed`] and a hydration still in flight is discarded.
    fn close(&self) {
        // Closed under the waiters lock so `ready()` cannot queue behind us;
        // the callbacks themselves are dropped after it is released.
        let (waiters, detached) = {
            let mut waiters = self.inner.waiters.lock();
            let detached = self.inner.channel.shut();
            (std::mem::take(&mut *waiters), detached)
        };
        if let Some(detached) = detached {
            tracing::debug!(dropped = detached.len(), "store closed");
        }
        for waiter in waiters {
            let _ = waiter.send(Err(StoreError::Closed));
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.channel.is_closed()
    }
}

impl<T: Clone + Send + Sync + 'static> Writable for Store<T> {
    fn publish(&self, value: T) -> Result<(), StoreError> {
        if self.inner.channel.is_closed() {
            tracing::warn!("attempted to publish to a closed store");
            return Ok(());
        }
        // Nothing is written when the nesting cap is hit.
        let _depth = self.inner.channel.enter()?;
        let waiters = {
            let mut waiters = self.inner.waiters.lock();
            *self.inner.value.write() = Some(value.clone());
            std::mem::take(&mut *waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Ok(value.clone()));
        }
        self.inner.channel.deliver(&value);
        Ok(())
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.value.read())
            .field("channel", &self.inner.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use crate::channel::MAX_PUBLISH_DEPTH;
    use crate::computed::Computed;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct AppState {
        count: usize,
        name: String,
    }

    fn app_state() -> AppState {
        AppState {
            count: 0,
            name: "test".to_string(),
        }
    }

    fn gated<T: Send + 'static>() -> (oneshot::Sender<T>, impl Future<Output = T> + Send) {
        let (sender, receiver) = oneshot::channel();
        (sender, async move {
            match receiver.await {
                Ok(value) => value,
                Err(_) => futures::future::pending().await,
            }
        })
    }

    #[test]
    fn store_unwrap_publish() {
        let store = Store::new(app_state());
        assert_eq!(store.unwrap().count, 0);

        store
            .publish(AppState {
                count: 42,
                name: "updated".to_string(),
            })
            .unwrap();

        assert_eq!(store.unwrap().count, 42);
        assert_eq!(store.unwrap().name, "updated");
    }

    #[test]
    fn store_update() {
        let store = Store::new(app_state());

        store.update(|state| state.count += 10).unwrap();

        assert_eq!(store.unwrap().count, 10);
        assert_eq!(store.read(|state| state.name.clone()), Some("test".into()));
    }

    #[test]
    fn store_subscribe_replays_then_observes() {
        let store = Store::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        store.subscribe(move |v| sink.lock().push(*v)).unwrap();
        assert_eq!(*seen.lock(), vec![0]);

        store.publish(5).unwrap();
        assert_eq!(*seen.lock(), vec![0, 5]);
        assert_eq!(store.unwrap(), 5);
    }

    #[test]
    fn every_publish_notifies_even_when_equal() {
        let store = Store::new(1);
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();
        store
            .subscribe(move |_| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        store.publish(1).unwrap();
        store.publish(1).unwrap();

        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn closed_store_blocks_updates() {
        let store = Store::new(42);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |v| sink.lock().push(*v)).unwrap();

        store.close();
        store.publish(100).unwrap();

        assert_eq!(*seen.lock(), vec![42]);
        assert_eq!(store.unwrap(), 42);
        assert!(matches!(store.subscribe(|_| {}), Err(StoreError::Closed)));
    }

    #[test]
    fn pending_subscriber_gets_value_once_hydrated() {
        let (open, init) = gated();
        let (store, hydration) = Store::deferred(init);
        assert_eq!(store.state(), HydrationState::Pending);
        assert_eq!(store.current(), None);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |v| sink.lock().push(*v)).unwrap();
        assert!(seen.lock().is_empty());

        open.send(42).unwrap();
        block_on(hydration).unwrap();

        assert_eq!(*seen.lock(), vec![42]);
        assert_eq!(store.state(), HydrationState::Ready);
    }

    #[test]
    fn ready_resolves_to_first_value_then_to_current() {
        let (open, init) = gated();
        let (store, hydration) = Store::deferred(init);
        let first = store.ready();

        open.send(42).unwrap();
        block_on(hydration).unwrap();
        assert_eq!(block_on(first).unwrap(), 42);

        store.publish(100).unwrap();
        assert_eq!(block_on(store.ready()).unwrap(), 100);
    }

    #[test]
    fn close_during_hydration_rejects_and_discards() {
        let (open, init) = gated();
        let (store, hydration) = Store::deferred(init);
        let waiting = store.ready();

        store.close();
        assert!(matches!(block_on(waiting), Err(StoreError::Closed)));
        assert!(matches!(block_on(store.ready()), Err(StoreError::Closed)));

        open.send(1).unwrap();
        assert!(matches!(block_on(hydration), Err(StoreError::Closed)));
        assert_eq!(store.current(), None);
    }

    #[test]
    fn failed_hydration_rejects_waiters_but_store_recovers() {
        let (store, hydration) =
            Store::<i32>::try_deferred(async { Err::<i32, _>("backend offline") });
        let waiting = store.ready();

        assert!(matches!(block_on(hydration), Err(StoreError::Hydration(_))));
        assert!(matches!(block_on(waiting), Err(StoreError::Hydration(_))));
        assert_eq!(store.state(), HydrationState::Pending);

        store.publish(3).unwrap();
        assert_eq!(block_on(store.ready()).unwrap(), 3);
    }

    #[test]
    fn from_value_handles_both_variants() {
        let (now, hydration) = Store::from_value(Value::Immediate(1));
        assert_eq!(now.unwrap(), 1);
        block_on(hydration).unwrap();

        let (later, hydration) = Store::from_value(Value::deferred(async { 2 }));
        assert!(!later.is_ready());
        block_on(hydration).unwrap();
        assert_eq!(later.unwrap(), 2);
    }

    #[test]
    fn deferred_publish_is_invisible_until_resolved() {
        let store = Store::new(0);
        let (open, value) = gated();
        let publication = store.publish_value(Value::deferred(value));

        assert_eq!(store.unwrap(), 0);
        open.send(9).unwrap();
        block_on(publication).unwrap();
        assert_eq!(store.unwrap(), 9);
    }

    #[test]
    fn watch_streams_replay_and_updates() {
        let store = Store::new(1);
        let values = store.watch().unwrap();

        store.publish(2).unwrap();
        store.close();

        let collected: Vec<i32> = block_on(values.collect());
        assert_eq!(collected, vec![1, 2]);
    }

    /// Run `f` on another thread; `false` if it has not returned in 5s.
    fn completes<F: FnOnce() + Send + 'static>(f: F) -> bool {
        let (done, finished) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            f();
            let _ = done.send(());
        });
        finished.recv_timeout(Duration::from_secs(5)).is_ok()
    }

    #[test]
    fn unsubscribe_drops_a_callback_owning_a_computed_of_the_same_store() {
        let store = Store::new(1);
        let doubled = Computed::new((store.clone(),), |(v,)| v * 2).unwrap();
        assert_eq!(store.subscriber_count(), 1);

        let subscription = store
            .subscribe(move |_| {
                doubled.unwrap();
            })
            .unwrap();
        store.publish(2).unwrap();

        assert!(completes(move || subscription.unsubscribe()));
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_drops_a_callback_owning_a_watch_of_the_same_store() {
        let store = Store::new(1);
        let values = Mutex::new(store.watch().unwrap());

        let subscription = store
            .subscribe(move |_| {
                let _values = values.lock();
            })
            .unwrap();
        store.publish(2).unwrap();

        assert!(completes(move || subscription.unsubscribe()));
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn close_drops_callbacks_after_releasing_the_store() {
        struct ReadsOnDrop {
            store: Store<i32>,
            seen: Arc<Mutex<Option<i32>>>,
        }

        impl Drop for ReadsOnDrop {
            fn drop(&mut self) {
                *self.seen.lock() = block_on(self.store.ready()).ok();
            }
        }

        let store = Store::new(7);
        let seen = Arc::new(Mutex::new(None));
        let on_drop = ReadsOnDrop {
            store: store.clone(),
            seen: seen.clone(),
        };
        store
            .subscribe(move |_| {
                let _ = &on_drop;
            })
            .unwrap();

        let closing = store.clone();
        assert!(completes(move || closing.close()));
        assert!(store.is_closed());
        assert_eq!(*seen.lock(), Some(7));
    }

    #[test]
    fn publish_past_the_nesting_cap_writes_nothing() {
        let store = Store::new(0usize);
        let mirror = Store::new(0usize);
        let rejected = Arc::new(Mutex::new(None));
        let (inner, sink, failure) = (store.clone(), mirror.clone(), rejected.clone());
        store
            .subscribe(move |v| {
                sink.publish(*v).unwrap();
                if let Err(err) = inner.publish(v + 1) {
                    failure.lock().get_or_insert(err.to_string());
                }
            })
            .unwrap();

        store.publish(1).unwrap();

        assert_eq!(
            rejected.lock().as_deref(),
            Some("publish recursion exceeded 64 nested calls")
        );
        assert_eq!(store.unwrap(), MAX_PUBLISH_DEPTH);
        assert_eq!(mirror.unwrap(), store.unwrap());
    }

    #[test]
    #[should_panic(expected = "hydration")]
    fn unwrap_on_pending_store_panics() {
        let store: Store<i32> = Store::pending();
        store.unwrap();
    }
}
