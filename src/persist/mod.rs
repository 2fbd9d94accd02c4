//! Write-through persistence of a store to a key/value backend.

mod codec;
mod persist;
mod storage;

pub use codec::{Codec, FnCodec, JsonCodec};
pub use persist::{persist, PersistOptions, Persisted, DEFAULT_KEY};
pub use storage::{MemoryStorage, Storage, StorageListener};
