use crate::overlay::context::OverlayContext;
use crate::overlay::store::StoreShared;
use crate::overlay::OverlayId;
use std::fmt;
use std::sync::{Arc, Weak};

/// Render function of an overlay. Called with a fresh context every time the
/// display surface draws the instance.
pub type RenderFn<V> = Arc<dyn Fn(&OverlayContext<V>) -> V + Send + Sync>;

/// Run by the store once the instance leaves the registry
pub(crate) type RemoveHook = Arc<dyn Fn() + Send + Sync>;

/// One registered overlay.
///
/// Instances handed out by the store are snapshots: the open flag reflects the
/// registry at the time the snapshot was taken and never changes afterwards.
pub struct OverlayInstance<V> {
    pub(crate) id: OverlayId,
    pub(crate) is_open: bool,
    pub(crate) render: RenderFn<V>,
    pub(crate) on_remove: Option<RemoveHook>,
    pub(crate) store: Weak<StoreShared<V>>,
}

impl<V> OverlayInstance<V> {
    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Context bound to this instance, mirroring its current open flag
    pub fn context(&self) -> OverlayContext<V> {
        OverlayContext::new(self.id, self.is_open, self.store.clone())
    }

    /// Invoke the render function with this instance's context
    pub fn render(&self) -> V {
        (self.render)(&self.context())
    }

    pub(crate) fn removed(&self) {
        if let Some(hook) = &self.on_remove {
            hook();
        }
    }
}

impl<V> Clone for OverlayInstance<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            is_open: self.is_open,
            render: self.render.clone(),
            on_remove: self.on_remove.clone(),
            store: self.store.clone(),
        }
    }
}

impl<V> fmt::Debug for OverlayInstance<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayInstance")
            .field("id", &self.id)
            .field("is_open", &self.is_open)
            .finish_non_exhaustive()
    }
}
