use super::Subscription;
use crate::error::StoreError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// How deep a subscriber may re-enter `publish` on the channel notifying it.
pub const MAX_PUBLISH_DEPTH: usize = 64;

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    active: AtomicBool,
    callback: Callback<T>,
}

struct State<T> {
    closed: bool,
    next_id: u64,
    entries: Vec<Arc<Entry<T>>>,
}

struct ChannelInner<T> {
    state: Mutex<State<T>>,
    depth: AtomicUsize,
}

impl<T> ChannelInner<T> {
    fn remove(&self, id: u64) {
        // The callback may own subscriptions to this channel; drop it unlocked.
        let removed = {
            let mut state = self.state.lock();
            state
                .entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|pos| state.entries.remove(pos))
        };
        if let Some(entry) = removed {
            entry.active.store(false, Ordering::Release);
        }
    }
}

/// A multicast publish/subscribe primitive with no memory of past values.
///
/// Subscribers are notified synchronously, in subscription order. A value
/// published before a subscription exists is never delivered to it.
pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T: Send + Sync + 'static> Channel<T> {
    /// Create a new, open channel.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                state: Mutex::new(State {
                    closed: false,
                    next_id: 0,
                    entries: Vec::new(),
                }),
                depth: AtomicUsize::new(0),
            }),
        }
    }

    /// Deliver `value` to every current subscriber.
    ///
    /// Publishing to a closed channel is a no-op that logs a warning.
    pub fn publish(&self, value: T) -> Result<(), StoreError> {
        self.notify(&value)
    }

    pub(crate) fn notify(&self, value: &T) -> Result<(), StoreError> {
        let _depth = self.enter()?;
        self.deliver(value);
        Ok(())
    }

    /// Claim one level of publish nesting, failing once the cap is reached.
    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>, StoreError> {
        DepthGuard::enter(&self.inner.depth)
    }

    /// Call every subscriber. The caller holds a [`DepthGuard`].
    pub(crate) fn deliver(&self, value: &T) {
        // Snapshot: subscribers added during this pass wait for the next one.
        let snapshot: Vec<Arc<Entry<T>>> = {
            let state = self.inner.state.lock();
            if state.closed {
                tracing::warn!("attempted to publish to a closed channel");
                return;
            }
            state.entries.clone()
        };
        tracing::trace!(subscribers = snapshot.len(), "publishing");

        for entry in snapshot {
            // Unsubscribed or closed mid-pass.
            if entry.active.load(Ordering::Acquire) {
                (entry.callback)(value);
            }
        }
    }

    /// Register `f` for every subsequent publish.
    ///
    /// Fails with [`StoreError::Closed`] once the channel has been closed.
    pub fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_callback(Arc::new(f))
    }

    pub(crate) fn subscribe_callback(
        &self,
        callback: Callback<T>,
    ) -> Result<Subscription, StoreError> {
        let id = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(StoreError::Closed);
            }
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Arc::new(Entry {
                id,
                active: AtomicBool::new(true),
                callback,
            }));
            id
        };

        let weak: Weak<ChannelInner<T>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        }))
    }

    /// Close the channel and drop every subscriber. Idempotent.
    pub fn close(&self) {
        if let Some(detached) = self.shut() {
            tracing::debug!(dropped = detached.len(), "channel closed");
        }
    }

    /// Mark the channel closed and hand back its subscribers, or `None` if
    /// it was already closed.
    ///
    /// The callbacks are released when the returned value is dropped, so a
    /// caller holding its own lock can drop them after unlocking.
    pub(crate) fn shut(&self) -> Option<Detached<T>> {
        let entries = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return None;
            }
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        for entry in &entries {
            entry.active.store(false, Ordering::Release);
        }
        Some(Detached(entries))
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }
}

impl<T: Send + Sync + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Channel")
            .field("closed", &state.closed)
            .field("subscribers", &state.entries.len())
            .finish()
    }
}

/// Subscribers removed by [`Channel::shut`], not yet dropped.
pub(crate) struct Detached<T>(Vec<Arc<Entry<T>>>);

impl<T> Detached<T> {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

pub(crate) struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> Result<Self, StoreError> {
        let current = depth.fetch_add(1, Ordering::AcqRel) + 1;
        if current > MAX_PUBLISH_DEPTH {
            depth.fetch_sub(1, Ordering::AcqRel);
            tracing::error!(
                limit = MAX_PUBLISH_DEPTH,
                "publish re-entered too deeply; a subscriber is republishing unconditionally"
            );
            return Err(StoreError::RecursionLimit {
                depth: MAX_PUBLISH_DEPTH,
            });
        }
        Ok(Self { depth })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, impl Fn(&i32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: &i32| sink.lock().push(*v))
    }

    #[test]
    fn delivers_in_subscription_order() {
        let channel = Channel::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            channel
                .subscribe(move |_: &i32| order.lock().push(tag))
                .unwrap();
        }

        channel.publish(1).unwrap();

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn never_replays_earlier_values() {
        let channel = Channel::new();
        channel.publish(1).unwrap();

        let (seen, sink) = recorder();
        channel.subscribe(sink).unwrap();
        assert!(seen.lock().is_empty());

        channel.publish(2).unwrap();
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn subscriber_added_mid_publish_waits_for_next_pass() {
        let channel: Channel<i32> = Channel::new();
        let (late_seen, late_sink) = recorder();
        let late_sink = Arc::new(late_sink);

        let registered = Arc::new(AtomicBool::new(false));
        let chan = channel.clone();
        channel
            .subscribe(move |_| {
                if !registered.swap(true, Ordering::SeqCst) {
                    let sink = late_sink.clone();
                    chan.subscribe(move |v| sink(v)).unwrap();
                }
            })
            .unwrap();

        channel.publish(1).unwrap();
        assert!(late_seen.lock().is_empty());

        channel.publish(2).unwrap();
        assert_eq!(*late_seen.lock(), vec![2]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let channel = Channel::new();
        let (seen, sink) = recorder();
        let subscription = channel.subscribe(sink).unwrap();

        channel.publish(1).unwrap();
        subscription.unsubscribe();
        subscription.unsubscribe();
        channel.publish(2).unwrap();

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn closed_channel_rejects_subscribers_and_ignores_publish() {
        let channel = Channel::new();
        let (seen, sink) = recorder();
        let subscription = channel.subscribe(sink).unwrap();

        channel.close();
        channel.close();
        channel.publish(7).unwrap();
        subscription.unsubscribe();

        assert!(seen.lock().is_empty());
        assert!(channel.is_closed());
        assert!(matches!(
            channel.subscribe(|_: &i32| {}),
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn unbounded_republish_hits_recursion_limit() {
        let channel: Channel<i32> = Channel::new();
        let failure = Arc::new(Mutex::new(None));
        let chan = channel.clone();
        let sink = failure.clone();
        channel
            .subscribe(move |v| {
                if let Err(err) = chan.publish(v + 1) {
                    sink.lock().get_or_insert(err.to_string());
                }
            })
            .unwrap();

        channel.publish(0).unwrap();

        assert_eq!(
            failure.lock().as_deref(),
            Some("publish recursion exceeded 64 nested calls")
        );
        assert_eq!(channel.inner.depth.load(Ordering::SeqCst), 0);
    }
}
