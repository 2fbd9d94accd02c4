//! Read-only values derived from other stores.

mod computed;
mod sources;

pub use computed::Computed;
pub use sources::Sources;
