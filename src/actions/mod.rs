//! Named mutations over a store.
//!
//! An [`ActionSet`] maps names to reducer generators; binding it to a store
//! yields a [`WithActions`] that dispatches by name.

mod actions;

pub use actions::{ActionSet, Reducer, WithActions};
