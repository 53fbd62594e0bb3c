use crate::overlay::store::{OverlayStore, StoreShared};
use crate::overlay::OverlayId;
use std::fmt;
use std::sync::Weak;

/// Per-render view of an overlay: its id, its open flag and the two
/// capabilities bound to it.
///
/// The context only holds a weak handle to its registry, so keeping one alive
/// never keeps the registry alive. Calls on a context whose registry is gone do
/// nothing.
pub struct OverlayContext<V> {
    overlay_id: OverlayId,
    is_open: bool,
    store: Weak<StoreShared<V>>,
}

impl<V> OverlayContext<V> {
    pub(crate) fn new(overlay_id: OverlayId, is_open: bool, store: Weak<StoreShared<V>>) -> Self {
        Self {
            overlay_id,
            is_open,
            store,
        }
    }

    pub fn overlay_id(&self) -> OverlayId {
        self.overlay_id
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Mark the overlay closed. It stays registered until unmounted.
    pub fn close(&self) {
        if let Some(store) = self.store() {
            store.set_open(self.overlay_id, false);
        }
    }

    /// Remove the overlay from its registry immediately
    pub fn unmount(&self) {
        if let Some(store) = self.store() {
            store.remove(self.overlay_id);
        }
    }

    fn store(&self) -> Option<OverlayStore<V>> {
        self.store.upgrade().map(OverlayStore::from_shared)
    }
}

impl<V> Clone for OverlayContext<V> {
    fn clone(&self) -> Self {
        Self {
            overlay_id: self.overlay_id,
            is_open: self.is_open,
            store: self.store.clone(),
        }
    }
}

impl<V> fmt::Debug for OverlayContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayContext")
            .field("overlay_id", &self.overlay_id)
            .field("is_open", &self.is_open)
            .finish()
    }
}
