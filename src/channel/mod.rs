//! Raw multicast publish/subscribe.
//!
//! A [`Channel`] forwards each published value to its current subscribers and
//! forgets it. Stores build "current value" semantics on top of it.

mod channel;
mod subscription;

pub(crate) use channel::Callback;
pub use channel::{Channel, MAX_PUBLISH_DEPTH};
pub use subscription::{Subscription, SubscriptionGuard};
