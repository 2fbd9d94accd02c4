use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type Detach = Box<dyn FnOnce() + Send>;

/// Handle returned by every `subscribe` call.
///
/// Calling [`unsubscribe`](Self::unsubscribe) removes the callback; repeated
/// calls are no-ops. Dropping the handle does *not* unsubscribe, use
/// [`guard`](Self::guard) for scope-bound subscriptions.
#[derive(Clone)]
pub struct Subscription {
    detach: Arc<Mutex<Option<Detach>>>,
}

impl Subscription {
    pub(crate) fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Arc::new(Mutex::new(Some(Box::new(detach)))),
        }
    }

    /// Remove the callback this handle was created for.
    pub fn unsubscribe(&self) {
        // Take first so the lock is not held while detaching.
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    /// `false` once [`unsubscribe`](Self::unsubscribe) has run on any clone.
    pub fn is_active(&self) -> bool {
        self.detach.lock().is_some()
    }

    /// Convert into a guard that unsubscribes when dropped.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard { subscription: self }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// RAII guard for a [`Subscription`].
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl SubscriptionGuard {
    /// The subscription this guard will release.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
