use crate::channel::{Channel, Subscription};
use crate::error::StorageError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback receiving the new serialized payload for a key.
pub type StorageListener = Arc<dyn Fn(&str) + Send + Sync>;

/// A string key/value backend a [`Persisted`](super::Persisted) store writes
/// through to.
///
/// Backends that can observe changes made elsewhere (another process,
/// another tab, another binding on the same key) override
/// [`subscribe`](Self::subscribe).
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Listen for changes to `key`.
    ///
    /// Returns `None` when the backend cannot report changes.
    fn subscribe(&self, key: &str, listener: StorageListener) -> Option<Subscription> {
        let _ = (key, listener);
        None
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn subscribe(&self, key: &str, listener: StorageListener) -> Option<Subscription> {
        (**self).subscribe(key, listener)
    }
}

#[derive(Default)]
struct MemoryInner {
    items: Mutex<HashMap<String, String>>,
    listeners: Mutex<HashMap<String, Channel<String>>>,
    quota: Option<usize>,
}

impl MemoryInner {
    fn listeners_for(&self, key: &str) -> Channel<String> {
        self.listeners
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

/// Volatile in-process storage.
///
/// Clones share the same map, so every binding built from one
/// `MemoryStorage` sees the others' writes through [`Storage::subscribe`].
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
}

impl MemoryStorage {
    /// An empty storage without a quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses writes once keys and values total more than
    /// `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                quota: Some(bytes),
                ..MemoryInner::default()
            }),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every item. Listeners are not notified.
    pub fn clear(&self) {
        self.inner.items.lock().clear();
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut items = self.inner.items.lock();
            if let Some(quota) = self.inner.quota {
                let used: usize = items
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let needed = key.len() + value.len();
                let available = quota.saturating_sub(used);
                if needed > available {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_string(),
                        needed,
                        available,
                    });
                }
            }
            items.insert(key.to_string(), value.to_string());
        }
        // Notify outside the item lock so listeners may read back.
        self.inner
            .listeners_for(key)
            .publish(value.to_string())
            .map_err(|err| StorageError::Backend(Box::new(err)))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.items.lock().remove(key);
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: StorageListener) -> Option<Subscription> {
        self.inner
            .listeners_for(key)
            .subscribe(move |value: &String| listener(value.as_str()))
            .ok()
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("items", &self.len())
            .field("quota", &self.inner.quota)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn stores_and_removes_items() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);

        storage.set_item("k", "42").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("42"));

        storage.remove_item("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn clones_share_items_and_listeners() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let subscription = other
            .subscribe(
                "k",
                Arc::new(move |value: &str| {
                    assert_eq!(value, "1");
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        storage.set_item("k", "1").unwrap();
        storage.set_item("other", "2").unwrap();
        assert_eq!(other.get_item("k").unwrap().as_deref(), Some("1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        storage.set_item("k", "1").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn quota_rejects_oversized_writes() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("k", "1234").unwrap();

        // Overwriting a key only counts the new value.
        storage.set_item("k", "1234567").unwrap();

        let err = storage.set_item("k2", "12345").unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded { needed: 7, available: 0, .. }
        ));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1234567"));
    }
}
