//! Bidirectional views into part of a store.

mod lens;

pub use lens::Lens;
