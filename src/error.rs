//! Error types shared by every store-shaped value.

use thiserror::Error;

/// Boxed error used for caller-supplied failures (reducers, codecs, backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by channels, stores and their combinators.
///
/// Publishing to a closed store is deliberately *not* an error: it is a
/// tolerated no-op that only emits a `tracing` warning.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Subscribing to (or awaiting) a channel that has been closed.
    #[error("cannot subscribe to a closed channel")]
    Closed,

    /// The value was needed synchronously but the store is still hydrating.
    #[error("store has not been hydrated yet")]
    NotReady,

    /// The deferred initializer of a store failed.
    #[error("store hydration failed: {0}")]
    Hydration(#[source] BoxError),

    /// A reducer returned an error; the store was left unmodified.
    #[error("action `{name}` failed: {source}")]
    Action {
        /// Name the action was registered under.
        name: String,
        /// Error returned by the reducer.
        #[source]
        source: BoxError,
    },

    /// No action is registered under this name.
    #[error("no action named `{0}`")]
    UnknownAction(String),

    /// The storage collaborator rejected a read or write.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A value could not be turned into its stored representation.
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] BoxError),

    /// A stored representation could not be turned back into a value.
    #[error("failed to deserialize value: {0}")]
    Deserialize(#[source] BoxError),

    /// A subscriber kept re-publishing into the channel that notified it.
    #[error("publish recursion exceeded {depth} nested calls")]
    RecursionLimit {
        /// The configured limit that was hit.
        depth: usize,
    },
}

/// Errors reported by a [`Storage`](crate::persist::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing the item would exceed the backend's capacity.
    #[error("storage quota exceeded writing `{key}`: need {needed} bytes, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// The backend cannot be reached in this environment.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(#[source] BoxError),
}
