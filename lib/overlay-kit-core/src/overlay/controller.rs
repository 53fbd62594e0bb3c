use crate::error::{OverlayError, OverlayResult};
use crate::overlay::context::OverlayContext;
use crate::overlay::instance::{RemoveHook, RenderFn};
use crate::overlay::response::{AsyncOverlayContext, OverlayResponse, Resolver};
use crate::overlay::store::OverlayStore;
use crate::overlay::OverlayId;
use log::{debug, trace};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Public surface for opening and dismissing overlays.
///
/// Clones share the same registry and id allocator.
pub struct OverlayController<V> {
    store: OverlayStore<V>,
    ids: Arc<Mutex<IdAllocator>>,
}

/// Generated ids count up from 1 and skip every id a caller claimed through
/// `open_with_id` before the counter reached it, so no id is handed out twice.
#[derive(Debug)]
struct IdAllocator {
    next: OverlayId,
    claimed: BTreeSet<OverlayId>,
}

impl IdAllocator {
    fn new() -> Self {
        Self {
            next: 1,
            claimed: BTreeSet::new(),
        }
    }

    fn generate(&mut self) -> OverlayId {
        loop {
            let id = self.next;
            let Some(following) = id.checked_add(1) else {
                panic!("Overlay id space exhausted");
            };
            self.next = following;

            if !self.claimed.remove(&id) {
                return id;
            }
            trace!("Overlay id {} was claimed, skipping", id);
        }
    }

    /// Returns whether `id` was newly reserved
    fn claim(&mut self, id: OverlayId) -> bool {
        id >= self.next && self.claimed.insert(id)
    }
}

impl<V> OverlayController<V> {
    pub fn new() -> Self {
        Self::with_store(OverlayStore::new())
    }

    /// Drive an existing registry. Ids already present in it are never reissued.
    pub fn with_store(store: OverlayStore<V>) -> Self {
        Self {
            store,
            ids: Arc::new(Mutex::new(IdAllocator::new())),
        }
    }

    pub fn store(&self) -> &OverlayStore<V> {
        &self.store
    }

    /// Open a new overlay and return its id
    pub fn open<F>(&self, render: F) -> OverlayId
    where
        F: Fn(&OverlayContext<V>) -> V + Send + Sync + 'static,
    {
        self.open_shared(Arc::new(render), None)
    }

    /// Open an overlay under a caller-chosen id.
    ///
    /// Fails if the id is already registered. [`open`](Self::open) never
    /// generates an id taken this way, even after it is unmounted.
    pub fn open_with_id<F>(&self, id: OverlayId, render: F) -> OverlayResult<OverlayId>
    where
        F: Fn(&OverlayContext<V>) -> V + Send + Sync + 'static,
    {
        let claimed = self.lock_ids().claim(id);

        if let Err(e) = self.store.add(id, render) {
            if claimed {
                self.lock_ids().claimed.remove(&id);
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Open an overlay whose result can be awaited.
    ///
    /// The response resolves with the value passed to
    /// [`AsyncOverlayContext::close`], or with `None` as soon as the overlay
    /// is unmounted without one.
    pub fn open_async<T, F>(&self, render: F) -> OverlayResponse<T>
    where
        V: 'static,
        T: Send + 'static,
        F: Fn(&AsyncOverlayContext<V, T>) -> V + Send + Sync + 'static,
    {
        let (resolver, receiver) = Resolver::channel();

        let dismiss = resolver.clone();
        let on_remove: RemoveHook = Arc::new(move || {
            if dismiss.dismiss() {
                trace!("Overlay unmounted without a response");
            }
        });

        let id = self.open_shared(
            Arc::new(move |ctx: &OverlayContext<V>| {
                render(&AsyncOverlayContext::new(ctx.clone(), resolver.clone()))
            }),
            Some(on_remove),
        );

        OverlayResponse::new(id, receiver)
    }

    /// Mark an overlay closed. It stays registered until unmounted.
    pub fn close(&self, id: OverlayId) {
        self.store.set_open(id, false);
    }

    /// Remove an overlay. Unknown ids are ignored.
    pub fn unmount(&self, id: OverlayId) {
        self.store.remove(id);
    }

    pub fn close_all(&self) {
        self.store.set_open_all(false);
    }

    pub fn unmount_all(&self) {
        self.store.remove_all();
    }

    fn lock_ids(&self) -> MutexGuard<'_, IdAllocator> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_shared(&self, render: RenderFn<V>, on_remove: Option<RemoveHook>) -> OverlayId {
        loop {
            let id = self.lock_ids().generate();
            match self.store.add_shared(id, render.clone(), on_remove.clone()) {
                Ok(()) => {
                    trace!("Opened overlay {}", id);
                    return id;
                }
                Err(OverlayError::DuplicateId(_)) => {
                    debug!("Overlay id {} already in use, skipping", id);
                }
            }
        }
    }
}

impl<V> Clone for OverlayController<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ids: self.ids.clone(),
        }
    }
}

impl<V> Default for OverlayController<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for OverlayController<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayController")
            .field("ids", &*self.lock_ids())
            .field("store", &self.store)
            .finish()
    }
}
