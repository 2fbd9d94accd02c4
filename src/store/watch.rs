use super::Readable;
use crate::channel::SubscriptionGuard;
use crate::error::StoreError;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream adapter over any [`Readable`].
///
/// Yields the current value first, then each published value. Ends when
/// the source is closed; detaches from it when dropped.
pub struct Watch<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    _subscription: SubscriptionGuard,
}

impl<T: Clone + Send + Sync + 'static> Watch<T> {
    pub(crate) fn new<R>(source: &R) -> Result<Self, StoreError>
    where
        R: Readable<Value = T>,
    {
        let (sender, receiver) = mpsc::unbounded();
        let sender = Mutex::new(sender);
        let subscription = source.subscribe(move |value: &T| {
            // The receiver may already be gone; the guard detaches us shortly.
            let _ = sender.lock().unbounded_send(value.clone());
        })?;
        Ok(Self {
            receiver,
            _subscription: subscription.guard(),
        })
    }
}

impl<T> Stream for Watch<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_next_unpin(cx)
    }
}
