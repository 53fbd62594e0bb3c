use std::fmt;

pub(crate) type ListenerId = u64;

/// Unsubscribe capability returned by [`OverlayStore::subscribe`].
///
/// Dropping the subscription removes the listener. A listener removed while a
/// notification pass is running may still see that pass, never a later one.
///
/// [`OverlayStore::subscribe`]: crate::overlay::OverlayStore::subscribe
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: ListenerId,
    unsubscribe: Option<Box<dyn FnOnce(ListenerId) + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(id: ListenerId, unsubscribe: F) -> Self
    where
        F: FnOnce(ListenerId) + Send + Sync + 'static,
    {
        Self {
            id,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}
