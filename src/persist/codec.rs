use crate::error::{BoxError, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts values to and from their stored string form.
pub trait Codec<T>: Send + Sync {
    fn serialize(&self, value: &T) -> Result<String, StoreError>;

    fn deserialize(&self, raw: &str) -> Result<T, StoreError>;
}

/// The default codec: JSON through `serde_json`.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|err| StoreError::Serialize(Box::new(err)))
    }

    fn deserialize(&self, raw: &str) -> Result<T, StoreError> {
        serde_json::from_str(raw).map_err(|err| StoreError::Deserialize(Box::new(err)))
    }
}

type SerializeFn<T> = Arc<dyn Fn(&T) -> Result<String, BoxError> + Send + Sync>;
type DeserializeFn<T> = Arc<dyn Fn(&str) -> Result<T, BoxError> + Send + Sync>;

/// A codec built from a pair of closures.
pub struct FnCodec<T> {
    serialize: SerializeFn<T>,
    deserialize: DeserializeFn<T>,
}

impl<T: 'static> FnCodec<T> {
    pub fn new<S, D, E1, E2>(serialize: S, deserialize: D) -> Self
    where
        S: Fn(&T) -> Result<String, E1> + Send + Sync + 'static,
        D: Fn(&str) -> Result<T, E2> + Send + Sync + 'static,
        E1: Into<BoxError>,
        E2: Into<BoxError>,
    {
        Self {
            serialize: Arc::new(move |value: &T| {
                serialize(value).map_err(Into::<BoxError>::into)
            }),
            deserialize: Arc::new(move |raw: &str| {
                deserialize(raw).map_err(Into::<BoxError>::into)
            }),
        }
    }
}

impl<T> Clone for FnCodec<T> {
    fn clone(&self) -> Self {
        Self {
            serialize: Arc::clone(&self.serialize),
            deserialize: Arc::clone(&self.deserialize),
        }
    }
}

impl<T> fmt::Debug for FnCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec(..)")
    }
}

impl<T> Codec<T> for FnCodec<T> {
    fn serialize(&self, value: &T) -> Result<String, StoreError> {
        (self.serialize)(value).map_err(StoreError::Serialize)
    }

    fn deserialize(&self, raw: &str) -> Result<T, StoreError> {
        (self.deserialize)(raw).map_err(StoreError::Deserialize)
    }
}
