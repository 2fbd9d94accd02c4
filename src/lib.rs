//! # Spellkit
//!
//! A small reactive value library: publish a value, observe it, and build
//! other values on top of it.
//!
//! ## Primitives
//!
//! - [`Channel<T>`] - Multicast publish/subscribe with no memory of past values
//! - [`Store<T>`] - A channel that remembers its last value and replays it to
//!   new subscribers, optionally hydrated from a future
//!
//! ## Combinators
//!
//! Every combinator wraps a store-shaped value and is itself store-shaped,
//! so they chain freely (a lens over a persisted store, a computed value
//! over lenses):
//! - [`Computed<V>`] - Read-only value derived from one to five parents
//! - [`Lens<S, P>`] - Read/write view of part of a parent
//! - [`WithActions<S, A>`] - Named reducers dispatched against a store
//! - [`Persisted<S>`] - Write-through synchronization with a [`Storage`] backend
//!
//! The capability traits [`Readable`] and [`Writable`] describe what each of
//! them can do.
//!
//! ```
//! use spellkit::{Computed, Readable, Store, Writable};
//!
//! let a = Store::new(1);
//! let b = Store::new(2);
//! let sum = Computed::new((a.clone(), b.clone()), |(a, b)| a + b).unwrap();
//!
//! a.publish(10).unwrap();
//! assert_eq!(sum.unwrap(), 12);
//! ```
//!
//! Notification is synchronous: `publish` returns after every subscriber
//! has run. Nothing here spawns tasks; deferred work is handed back as a
//! future ([`Hydration`], [`Publication`]) for the caller to drive.

pub mod actions;
pub mod channel;
pub mod computed;
pub mod error;
pub mod lens;
pub mod persist;
pub mod store;

// Re-export main types for convenience
pub use actions::{ActionSet, Reducer, WithActions};
pub use channel::{Channel, Subscription, SubscriptionGuard, MAX_PUBLISH_DEPTH};
pub use computed::{Computed, Sources};
pub use error::{BoxError, StorageError, StoreError};
pub use lens::Lens;
pub use persist::{
    persist, Codec, FnCodec, JsonCodec, MemoryStorage, PersistOptions, Persisted, Storage,
    StorageListener, DEFAULT_KEY,
};
pub use store::{
    Hydration, HydrationState, Publication, Readable, Ready, Store, Value, Watch, Writable,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = Store::new(0);
        assert_eq!(store.unwrap(), 0);
        store.publish(42).unwrap();
        assert_eq!(store.unwrap(), 42);
    }
}
