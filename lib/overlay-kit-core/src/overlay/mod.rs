mod context;
mod controller;
mod instance;
mod response;
mod store;
mod subscription;
mod surface;

pub use context::OverlayContext;
pub use controller::OverlayController;
pub use instance::{OverlayInstance, RenderFn};
pub use response::{AsyncOverlayContext, OverlayResponse};
pub use store::{OverlayStore, Snapshot};
pub use subscription::Subscription;
pub use surface::{OverlaySurface, RenderedOverlay};

use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub type OverlayId = u64;

static SCOPES: Lazy<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Process-wide controller for overlays rendering to `V`.
///
/// Created on first use and kept for the life of the process. Every call with
/// the same `V` returns a handle to the same registry.
pub fn controller<V: 'static>() -> OverlayController<V> {
    let mut scopes = SCOPES.lock().unwrap_or_else(PoisonError::into_inner);
    scopes
        .entry(TypeId::of::<V>())
        .or_insert_with(|| Box::new(OverlayController::<V>::new()))
        .downcast_ref::<OverlayController<V>>()
        .cloned()
        .expect("Overlay scope registered under a different view type")
}
