use crate::error::{OverlayError, OverlayResult};
use crate::overlay::context::OverlayContext;
use crate::overlay::instance::{OverlayInstance, RemoveHook, RenderFn};
use crate::overlay::subscription::{ListenerId, Subscription};
use crate::overlay::OverlayId;
use indexmap::IndexMap;
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Immutable view of the whole registry, in registration order
pub type Snapshot<V> = Arc<[OverlayInstance<V>]>;

type Listener<V> = Arc<dyn Fn(&[OverlayInstance<V>]) + Send + Sync>;

/// Ordered registry of overlay instances.
///
/// Cloning the store yields another handle to the same registry. Every call
/// that changes the registry notifies all listeners exactly once with a
/// snapshot taken right after the change. Calls that change nothing (unknown
/// id, flag already set, empty registry) are silent no-ops.
pub struct OverlayStore<V> {
    shared: Arc<StoreShared<V>>,
}

pub(crate) struct StoreShared<V> {
    state: Mutex<StoreState<V>>,
    listeners: Mutex<Vec<(ListenerId, Listener<V>)>>,
    next_listener_id: AtomicU64,
}

struct StoreState<V> {
    instances: IndexMap<OverlayId, OverlayInstance<V>>,
    /// Snapshots waiting to be delivered, oldest first
    pending: VecDeque<Snapshot<V>>,
    notifying: bool,
}

impl<V> OverlayStore<V> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(StoreShared {
                state: Mutex::new(StoreState {
                    instances: IndexMap::new(),
                    pending: VecDeque::new(),
                    notifying: false,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<StoreShared<V>>) -> Self {
        Self { shared }
    }

    /// Register a new open overlay under `id`
    pub fn add<F>(&self, id: OverlayId, render: F) -> OverlayResult<()>
    where
        F: Fn(&OverlayContext<V>) -> V + Send + Sync + 'static,
    {
        self.add_shared(id, Arc::new(render), None)
    }

    pub(crate) fn add_shared(
        &self,
        id: OverlayId,
        render: RenderFn<V>,
        on_remove: Option<RemoveHook>,
    ) -> OverlayResult<()> {
        let store = Arc::downgrade(&self.shared);
        let mut rejected = false;

        self.mutate(|instances| {
            if instances.contains_key(&id) {
                rejected = true;
                return false;
            }

            instances.insert(
                id,
                OverlayInstance {
                    id,
                    is_open: true,
                    render,
                    on_remove,
                    store,
                },
            );
            debug!("Added overlay {}", id);
            true
        });

        if rejected {
            warn!("Rejected overlay {}: id already registered", id);
            return Err(OverlayError::DuplicateId(id));
        }

        Ok(())
    }

    /// Set the open flag of one overlay. Returns whether anything changed.
    pub fn set_open(&self, id: OverlayId, value: bool) -> bool {
        self.mutate(|instances| match instances.get_mut(&id) {
            Some(instance) if instance.is_open != value => {
                instance.is_open = value;
                trace!("Overlay {} is_open = {}", id, value);
                true
            }
            _ => false,
        })
    }

    /// Set the open flag of every overlay, keeping membership and order
    pub fn set_open_all(&self, value: bool) -> bool {
        self.mutate(|instances| {
            let mut changed = false;
            for instance in instances.values_mut() {
                if instance.is_open != value {
                    instance.is_open = value;
                    changed = true;
                }
            }

            if changed {
                trace!("All {} overlays is_open = {}", instances.len(), value);
            }
            changed
        })
    }

    /// Remove one overlay, keeping the order of the rest
    pub fn remove(&self, id: OverlayId) -> bool {
        let mut removed = None;
        self.mutate(|instances| {
            removed = instances.shift_remove(&id);
            if removed.is_some() {
                debug!("Removed overlay {}", id);
            }
            removed.is_some()
        });

        match removed {
            Some(instance) => {
                instance.removed();
                true
            }
            None => false,
        }
    }

    pub fn remove_all(&self) -> bool {
        let mut removed = IndexMap::new();
        self.mutate(|instances| {
            if instances.is_empty() {
                return false;
            }

            debug!("Removed all {} overlays", instances.len());
            removed = std::mem::take(instances);
            true
        });

        for instance in removed.values() {
            instance.removed();
        }
        !removed.is_empty()
    }

    /// Register a listener called after every change with the full registry.
    ///
    /// Listeners run synchronously on the mutating thread, in registration
    /// order. A listener may itself mutate the store; that change is applied
    /// at once and delivered after the current pass finishes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[OverlayInstance<V>]) + Send + Sync + 'static,
        V: 'static,
    {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .lock_listeners()
            .push((id, Arc::new(listener)));
        trace!("Listener {} subscribed", id);

        let shared = Arc::downgrade(&self.shared);
        Subscription::new(id, move |id| {
            if let Some(shared) = shared.upgrade() {
                shared.lock_listeners().retain(|(listener_id, _)| *listener_id != id);
                trace!("Listener {} unsubscribed", id);
            }
        })
    }

    pub fn snapshot(&self) -> Snapshot<V> {
        self.shared.lock_state().instances.values().cloned().collect()
    }

    pub fn get(&self, id: OverlayId) -> Option<OverlayInstance<V>> {
        self.shared.lock_state().instances.get(&id).cloned()
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.shared.lock_state().instances.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<OverlayId> {
        self.shared.lock_state().instances.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.lock_state().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_count(&self) -> usize {
        self.shared.lock_listeners().len()
    }

    /// Apply `f` to the registry and, if it reports a change, queue a snapshot
    /// and deliver it unless another pass is already delivering.
    fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut IndexMap<OverlayId, OverlayInstance<V>>) -> bool,
    {
        let should_drain = {
            let mut state = self.shared.lock_state();
            if !f(&mut state.instances) {
                return false;
            }

            let snapshot: Snapshot<V> = state.instances.values().cloned().collect();
            state.pending.push_back(snapshot);
            !std::mem::replace(&mut state.notifying, true)
        };

        if should_drain {
            self.shared.drain();
        }
        true
    }
}

impl<V> StoreShared<V> {
    fn lock_state(&self) -> MutexGuard<'_, StoreState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener<V>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) {
        let _guard = DrainGuard { shared: self };

        loop {
            let snapshot = {
                let mut state = self.lock_state();
                match state.pending.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        state.notifying = false;
                        return;
                    }
                }
            };

            let listeners: Vec<Listener<V>> = self
                .lock_listeners()
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect();

            trace!(
                "Notifying {} listeners ({} overlays)",
                listeners.len(),
                snapshot.len()
            );
            for listener in listeners {
                listener(&snapshot);
            }
        }
    }
}

/// Resets the delivery state if a listener panics mid-pass
struct DrainGuard<'a, V> {
    shared: &'a StoreShared<V>,
}

impl<V> Drop for DrainGuard<'_, V> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.shared.lock_state();
            state.notifying = false;
            state.pending.clear();
        }
    }
}

impl<V> Clone for OverlayStore<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V> Default for OverlayStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for OverlayStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("OverlayStore")
            .field("instances", &state.instances.values().collect::<Vec<_>>())
            .finish()
    }
}
