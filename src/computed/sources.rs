use crate::channel::Subscription;
use crate::error::StoreError;
use crate::store::Readable;
use std::sync::Arc;

pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// A fixed set of parent values a [`Computed`](super::Computed) derives from.
///
/// Implemented for tuples of one to five [`Readable`]s.
pub trait Sources: Send + Sync + 'static {
    /// Tuple of the parents' values, in order.
    type Values;

    /// Every parent's current value, or `None` if any is still Pending.
    fn values(&self) -> Option<Self::Values>;

    /// Subscribe `hook` to every parent. On failure nothing stays subscribed.
    #[doc(hidden)]
    fn subscribe_each(&self, hook: &Hook) -> Result<Vec<Subscription>, StoreError>;
}

macro_rules! impl_sources {
    ($($source:ident $idx:tt),+) => {
        impl<$($source),+> Sources for ($($source,)+)
        where
            $($source: Readable + 'static,)+
        {
            type Values = ($(<$source as Readable>::Value,)+);

            fn values(&self) -> Option<Self::Values> {
                Some(($(self.$idx.current()?,)+))
            }

            fn subscribe_each(&self, hook: &Hook) -> Result<Vec<Subscription>, StoreError> {
                let mut subscriptions = Vec::new();
                $(
                    let notify = Arc::clone(hook);
                    match self.$idx.subscribe(move |_| notify()) {
                        Ok(subscription) => subscriptions.push(subscription),
                        Err(err) => {
                            for subscription in &subscriptions {
                                subscription.unsubscribe();
                            }
                            return Err(err);
                        }
                    }
                )+
                Ok(subscriptions)
            }
        }
    };
}

impl_sources!(A 0);
impl_sources!(A 0, B 1);
impl_sources!(A 0, B 1, C 2);
impl_sources!(A 0, B 1, C 2, D 3);
impl_sources!(A 0, B 1, C 2, D 3, E 4);
