use crate::channel::Subscription;
use crate::error::StoreError;
use crate::store::{Publication, Readable, Ready, Value, Writable};
use futures::future;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Getter<T, P> = Arc<dyn Fn(&T) -> P + Send + Sync>;
type Setter<T, P> = Arc<dyn Fn(&T, P) -> T + Send + Sync>;

/// The subscriptions a lens holds on its parent.
#[derive(Default)]
struct Attachment {
    closed: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Attachment {
    fn track(&self, subscription: &Subscription) {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(Subscription::is_active);
        subscriptions.push(subscription.clone());
    }

    fn detach(&self) {
        self.closed.store(true, Ordering::Release);
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        tracing::debug!(detached = subscriptions.len(), "lens closed");
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A read/write view of one part of a parent store.
///
/// `unwrap` is always `get(parent)`, and publishing `part` publishes
/// `set(parent, part)` to the parent. The lens holds no value of its own.
///
/// Callers must supply a lawful pair: `get(&set(&s, p)) == p` for every
/// state `s` and part `p`. The lens does not check this.
///
/// Closing a lens detaches its subscriptions and disables it; the parent,
/// which may have other observers, stays open.
pub struct Lens<S: Readable, P> {
    parent: S,
    get: Getter<S::Value, P>,
    set: Setter<S::Value, P>,
    attachment: Arc<Attachment>,
}

impl<S, P> Lens<S, P>
where
    S: Writable,
    P: Clone + Send + Sync + 'static,
{
    /// Focus `parent` through a `get`/`set` pair.
    ///
    /// # Example
    ///
    /// ```
    /// use spellkit::{Lens, Readable, Store, Writable};
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// struct Person { name: String, age: u32 }
    ///
    /// let person = Store::new(Person { name: "John".into(), age: 30 });
    /// let name = Lens::new(
    ///     person.clone(),
    ///     |p: &Person| p.name.clone(),
    ///     |p: &Person, name| Person { name, ..p.clone() },
    /// );
    ///
    /// name.publish("Jane".into()).unwrap();
    /// assert_eq!(person.unwrap(), Person { name: "Jane".into(), age: 30 });
    /// ```
    pub fn new<G, St>(parent: S, get: G, set: St) -> Self
    where
        G: Fn(&S::Value) -> P + Send + Sync + 'static,
        St: Fn(&S::Value, P) -> S::Value + Send + Sync + 'static,
    {
        Self {
            parent,
            get: Arc::new(get),
            set: Arc::new(set),
            attachment: Arc::new(Attachment::default()),
        }
    }

    /// Focus on a single field through a pair of accessors.
    ///
    /// ```
    /// use spellkit::{Lens, Readable, Store, Writable};
    ///
    /// #[derive(Clone)]
    /// struct Settings { volume: u8, muted: bool }
    ///
    /// let settings = Store::new(Settings { volume: 3, muted: false });
    /// let volume = Lens::field(settings.clone(), |s| &s.volume, |s| &mut s.volume);
    ///
    /// volume.publish(7).unwrap();
    /// assert_eq!(settings.unwrap().volume, 7);
    /// ```
    pub fn field(
        parent: S,
        read: fn(&S::Value) -> &P,
        write: fn(&mut S::Value) -> &mut P,
    ) -> Self {
        Self::new(
            parent,
            move |whole| read(whole).clone(),
            move |whole, part| {
                let mut next = whole.clone();
                *write(&mut next) = part;
                next
            },
        )
    }

    /// The store this lens reads from and writes into.
    pub fn parent(&self) -> &S {
        &self.parent
    }
}

impl<S, P> Lens<S, P>
where
    S: Writable + Clone + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Resolve `part`, wait for the parent to be Ready, then publish.
    pub fn publish_when_ready(&self, part: Value<P>) -> Publication {
        let lens = self.clone();
        async move {
            let part = part.resolve().await;
            let whole = lens.parent.ready().await?;
            lens.write(&whole, part)
        }
        .boxed()
    }
}

impl<S, P> Lens<S, P>
where
    S: Writable,
    P: Clone + Send + Sync + 'static,
{
    fn write(&self, whole: &S::Value, part: P) -> Result<(), StoreError> {
        if self.attachment.is_closed() {
            tracing::warn!("attempted to publish to a closed lens");
            return Ok(());
        }
        self.parent.publish((self.set)(whole, part))
    }
}

impl<S, P> Readable for Lens<S, P>
where
    S: Readable,
    P: Clone + Send + Sync + 'static,
{
    type Value = P;

    fn current(&self) -> Option<P> {
        self.parent.current().map(|whole| (self.get)(&whole))
    }

    fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        if self.attachment.is_closed() {
            return Err(StoreError::Closed);
        }
        let get = Arc::clone(&self.get);
        let subscription = self.parent.subscribe(move |whole| f(&get(whole)))?;
        self.attachment.track(&subscription);
        Ok(subscription)
    }

    fn ready(&self) -> Ready<P> {
        if self.attachment.is_closed() {
            return future::ready(Err(StoreError::Closed)).boxed();
        }
        let get = Arc::clone(&self.get);
        let parent_ready = self.parent.ready();
        async move { parent_ready.await.map(|whole| get(&whole)) }.boxed()
    }

    /// Detach from the parent without closing it.
    fn close(&self) {
        self.attachment.detach();
    }

    fn is_closed(&self) -> bool {
        self.attachment.is_closed() || self.parent.is_closed()
    }
}

impl<S, P> Writable for Lens<S, P>
where
    S: Writable,
    P: Clone + Send + Sync + 'static,
{
    /// Fails with [`StoreError::NotReady`] while the parent is Pending; use
    /// [`Lens::publish_when_ready`] to wait instead.
    fn publish(&self, part: P) -> Result<(), StoreError> {
        let whole = self.parent.current().ok_or(StoreError::NotReady)?;
        self.write(&whole, part)
    }
}

impl<S: Readable + Clone, P> Clone for Lens<S, P> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
            attachment: Arc::clone(&self.attachment),
        }
    }
}

impl<S, P> fmt::Debug for Lens<S, P>
where
    S: Readable + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("parent", &self.parent)
            .field("closed", &self.attachment.is_closed())
            .finish()
    }
}
