//! Stores: channels with a remembered current value.
//!
//! A [`Store`] is either Ready (holds a value) or Pending (hydrating from a
//! future). Every store-shaped type in the crate implements [`Readable`],
//! and the writable ones [`Writable`].

mod store;
mod traits;
mod value;
mod watch;

pub use store::{HydrationState, Store};
pub use traits::{Readable, Writable};
pub use value::{Hydration, Publication, Ready, Value};
pub use watch::Watch;
