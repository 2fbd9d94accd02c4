use super::codec::{Codec, FnCodec, JsonCodec};
use super::storage::{MemoryStorage, Storage, StorageListener};
use crate::channel::Subscription;
use crate::error::{BoxError, StoreError};
use crate::store::{Hydration, Readable, Ready, Writable};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage key used when none is configured.
pub const DEFAULT_KEY: &str = "store";

/// Where and how a [`Persisted`] store keeps its value.
///
/// Defaults to key [`DEFAULT_KEY`], a fresh [`MemoryStorage`] and
/// [`JsonCodec`].
pub struct PersistOptions<T> {
    key: String,
    storage: Arc<dyn Storage>,
    codec: Arc<dyn Codec<T>>,
}

impl<T> PersistOptions<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// JSON-encoded values in a fresh [`MemoryStorage`] under [`DEFAULT_KEY`].
    pub fn new() -> Self {
        Self::with_codec(JsonCodec::new())
    }
}

impl<T> Default for PersistOptions<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> PersistOptions<T> {
    /// Options for values that are not serde types.
    pub fn with_codec(codec: impl Codec<T> + 'static) -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            storage: Arc::new(MemoryStorage::new()),
            codec: Arc::new(codec),
        }
    }

    /// The storage key to read and write.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// The backend to persist into.
    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    /// Replace the codec.
    pub fn codec(mut self, codec: impl Codec<T> + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Replace the codec with a serialize/deserialize pair.
    pub fn with_functions<S, D, E1, E2>(self, serialize: S, deserialize: D) -> Self
    where
        S: Fn(&T) -> Result<String, E1> + Send + Sync + 'static,
        D: Fn(&str) -> Result<T, E2> + Send + Sync + 'static,
        E1: Into<BoxError>,
        E2: Into<BoxError>,
    {
        self.codec(FnCodec::new(serialize, deserialize))
    }
}

impl<T> fmt::Debug for PersistOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

struct Binding<T> {
    key: String,
    storage: Arc<dyn Storage>,
    codec: Arc<dyn Codec<T>>,
    hydrated: AtomicBool,
    // Writes in flight from this binding; their storage echoes are dropped.
    // A count, since a write can nest inside another one's notification.
    writing: AtomicUsize,
    listener: Mutex<Option<Subscription>>,
}

impl<T> Binding<T> {
    fn write(&self, raw: &str) -> Result<(), StoreError> {
        self.writing.fetch_add(1, Ordering::AcqRel);
        let result = self.storage.set_item(&self.key, raw);
        self.writing.fetch_sub(1, Ordering::AcqRel);
        result.map_err(StoreError::from)
    }

    fn detach(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.unsubscribe();
        }
    }
}

impl<T> Drop for Binding<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A store whose value is written through to a [`Storage`] backend.
///
/// `publish` serializes the value and writes it to storage before the
/// wrapped store is updated, so a storage failure leaves the store
/// untouched and is returned to the caller.
///
/// When the backend reports changes made elsewhere, they are decoded and
/// published into the wrapped store without being written back.
pub struct Persisted<S: Readable> {
    store: S,
    binding: Arc<Binding<S::Value>>,
}

impl<S> Persisted<S>
where
    S: Writable + Clone + 'static,
{
    /// Bind `store` to storage without reading it back yet; see
    /// [`hydrate`](Self::hydrate) and [`persist`].
    pub fn new(store: S, options: PersistOptions<S::Value>) -> Self {
        let PersistOptions {
            key,
            storage,
            codec,
        } = options;
        let binding = Arc::new(Binding {
            key,
            storage,
            codec,
            hydrated: AtomicBool::new(false),
            writing: AtomicUsize::new(0),
            listener: Mutex::new(None),
        });

        let weak = Arc::downgrade(&binding);
        let target = store.clone();
        let listener: StorageListener = Arc::new(move |raw: &str| {
            let Some(binding) = weak.upgrade() else {
                return;
            };
            if binding.writing.load(Ordering::Acquire) > 0 {
                return;
            }
            match binding.codec.deserialize(raw) {
                Ok(value) => {
                    if let Err(err) = target.publish(value) {
                        tracing::warn!(
                            key = %binding.key,
                            error = %err,
                            "failed to apply storage change"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        key = %binding.key,
                        error = %err,
                        "ignoring undecodable storage payload"
                    );
                }
            }
        });
        let subscription = binding.storage.subscribe(&binding.key, listener);
        *binding.listener.lock() = subscription;

        Self { store, binding }
    }

    /// Read the stored value back into the wrapped store.
    ///
    /// Waits for the wrapped store to be Ready first, so a stored value
    /// always wins over a deferred initializer. Resolves to whether a stored
    /// value was found.
    pub fn hydrate(&self) -> BoxFuture<'static, Result<bool, StoreError>> {
        let this = self.clone();
        async move {
            this.store.ready().await?;
            let binding = &this.binding;
            let found = match binding.storage.get_item(&binding.key)? {
                Some(raw) => {
                    let value = binding.codec.deserialize(&raw)?;
                    this.store.publish(value)?;
                    true
                }
                None => false,
            };
            binding.hydrated.store(true, Ordering::Release);
            tracing::debug!(key = %binding.key, found, "hydrated from storage");
            Ok(found)
        }
        .boxed()
    }
}

impl<S: Readable> Persisted<S> {
    /// Whether [`hydrate`](Self::hydrate) has completed.
    pub fn is_hydrated(&self) -> bool {
        self.binding.hydrated.load(Ordering::Acquire)
    }

    /// Remove the stored value. The wrapped store keeps its current value.
    pub fn forget(&self) -> Result<(), StoreError> {
        self.binding.storage.remove_item(&self.binding.key)?;
        Ok(())
    }

    /// The storage key this binding owns.
    pub fn key(&self) -> &str {
        &self.binding.key
    }

    /// The wrapped store. Publishing to it directly bypasses storage.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Bind `store` to storage and start reading the stored value back.
///
/// The returned [`Hydration`] performs the read; until it completes,
/// [`Persisted::is_hydrated`] is `false`.
///
/// ```
/// use spellkit::{persist, MemoryStorage, PersistOptions, Readable, Storage, Store, Writable};
///
/// let storage = MemoryStorage::new();
/// let (counter, hydration) = persist(
///     Store::new(0),
///     PersistOptions::new().key("counter").storage(storage.clone()),
/// );
/// futures::executor::block_on(hydration).unwrap();
///
/// counter.publish(42).unwrap();
/// assert_eq!(storage.get_item("counter").unwrap().as_deref(), Some("42"));
/// assert_eq!(counter.unwrap(), 42);
/// ```
pub fn persist<S>(store: S, options: PersistOptions<S::Value>) -> (Persisted<S>, Hydration)
where
    S: Writable + Clone + 'static,
{
    let persisted = Persisted::new(store, options);
    let read_back = persisted.hydrate();
    let hydration = Hydration::new(async move { read_back.await.map(|_| ()) });
    (persisted, hydration)
}

impl<S: Readable> Readable for Persisted<S> {
    type Value = S::Value;

    fn current(&self) -> Option<S::Value> {
        self.store.current()
    }

    fn subscribe<F>(&self, f: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&S::Value) + Send + Sync + 'static,
    {
        self.store.subscribe(f)
    }

    fn ready(&self) -> Ready<S::Value> {
        self.store.ready()
    }

    /// Stop listening to storage and close the wrapped store.
    fn close(&self) {
        self.binding.detach();
        self.store.close();
    }

    fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl<S: Writable> Writable for Persisted<S> {
    fn publish(&self, value: S::Value) -> Result<(), StoreError> {
        if self.store.is_closed() {
            tracing::warn!(key = %self.binding.key, "attempted to publish to a closed store");
            return Ok(());
        }
        let raw = self.binding.codec.serialize(&value)?;
        self.binding.write(&raw)?;
        self.store.publish(value)
    }
}

impl<S: Readable + Clone> Clone for Persisted<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            binding: Arc::clone(&self.binding),
        }
    }
}

impl<S: Readable + fmt::Debug> fmt::Debug for Persisted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.binding.key)
            .field("hydrated", &self.is_hydrated())
            .field("store", &self.store)
            .finish()
    }
}
