use crate::overlay::context::OverlayContext;
use crate::overlay::instance::OverlayInstance;
use crate::overlay::store::OverlayStore;
use crate::overlay::subscription::Subscription;
use crate::overlay::OverlayId;
use indexmap::IndexMap;
use log::{debug, trace};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One drawn overlay, in the order the registry holds them
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOverlay<V> {
    pub id: OverlayId,
    pub is_open: bool,
    pub view: V,
}

type FrameHook<V> = Box<dyn Fn(&[RenderedOverlay<V>]) + Send>;

/// Projects a registry onto something that can be displayed.
///
/// Every registry change re-renders all overlays in order. Closed overlays
/// stay in the frame while they exit; [`tick`](Self::tick) finishes exits that
/// have run for `exit_duration` by unmounting them through their own context.
pub struct OverlaySurface<V> {
    state: Arc<Mutex<SurfaceState<V>>>,
    // Held for its Drop
    _subscription: Subscription,
}

struct SurfaceState<V> {
    frame: Vec<RenderedOverlay<V>>,
    exiting: IndexMap<OverlayId, Exit<V>>,
    exit_duration: Duration,
    frames_rendered: u64,
    hook: Option<FrameHook<V>>,
}

struct Exit<V> {
    since: Instant,
    context: OverlayContext<V>,
}

impl<V: Send + 'static> OverlaySurface<V> {
    /// Render the registry as it is now and follow every later change
    pub fn attach(store: &OverlayStore<V>, exit_duration: Duration) -> Self {
        let state = Arc::new(Mutex::new(SurfaceState {
            frame: Vec::new(),
            exiting: IndexMap::new(),
            exit_duration,
            frames_rendered: 0,
            hook: None,
        }));

        Self::project(&state, &store.snapshot());

        let listener_state = state.clone();
        let subscription = store.subscribe(move |instances| {
            Self::project(&listener_state, instances);
        });

        debug!("Surface attached ({} overlays)", store.len());
        Self {
            state,
            _subscription: subscription,
        }
    }

    /// Called with every new frame. The hook must not call back into the surface.
    pub fn on_frame<F>(&self, hook: F)
    where
        F: Fn(&[RenderedOverlay<V>]) + Send + 'static,
    {
        self.lock().hook = Some(Box::new(hook));
    }

    /// Unmount every overlay whose exit started at least `exit_duration`
    /// before `now`. Returns how many were unmounted.
    pub fn tick(&self, now: Instant) -> usize {
        let finished: Vec<OverlayContext<V>> = {
            let mut state = self.lock();
            let exit_duration = state.exit_duration;
            let done: Vec<OverlayId> = state
                .exiting
                .iter()
                .filter(|(_, exit)| now.saturating_duration_since(exit.since) >= exit_duration)
                .map(|(id, _)| *id)
                .collect();

            done.iter()
                .filter_map(|id| state.exiting.shift_remove(id))
                .map(|exit| exit.context)
                .collect()
        };

        // Unmounting re-enters the listener, so the lock must be released first
        for context in &finished {
            trace!("Exit of overlay {} finished", context.overlay_id());
            context.unmount();
        }
        finished.len()
    }

    pub fn frame(&self) -> Vec<RenderedOverlay<V>>
    where
        V: Clone,
    {
        self.lock().frame.clone()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.lock().frames_rendered
    }

    /// Overlays currently running their exit, oldest first
    pub fn exiting(&self) -> Vec<OverlayId> {
        self.lock().exiting.keys().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn project(state: &Mutex<SurfaceState<V>>, instances: &[OverlayInstance<V>]) {
        // Render functions may mutate the registry, so render before locking
        let frame: Vec<RenderedOverlay<V>> = instances
            .iter()
            .map(|instance| RenderedOverlay {
                id: instance.id(),
                is_open: instance.is_open(),
                view: instance.render(),
            })
            .collect();

        let now = Instant::now();
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

        state
            .exiting
            .retain(|id, _| instances.iter().any(|i| i.id() == *id && !i.is_open()));
        for instance in instances.iter().filter(|i| !i.is_open()) {
            state.exiting.entry(instance.id()).or_insert_with(|| Exit {
                since: now,
                context: instance.context(),
            });
        }

        state.frame = frame;
        state.frames_rendered += 1;
        if let Some(hook) = &state.hook {
            hook(&state.frame);
        }
    }
}
