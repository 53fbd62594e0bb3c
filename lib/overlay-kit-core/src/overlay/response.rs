use crate::overlay::context::OverlayContext;
use crate::overlay::OverlayId;
use log::trace;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Sending half of a response, shared by every context of one overlay and by
/// its removal hook. Whoever takes the sender first settles the response.
pub(crate) struct Resolver<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Resolver<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            receiver,
        )
    }

    fn take(&self) -> Option<oneshot::Sender<T>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Settle the response with `None`. Returns whether it was still pending.
    pub(crate) fn dismiss(&self) -> bool {
        self.take().is_some()
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Context handed to overlays opened with
/// [`OverlayController::open_async`](crate::overlay::OverlayController::open_async).
pub struct AsyncOverlayContext<V, T> {
    inner: OverlayContext<V>,
    resolver: Resolver<T>,
}

impl<V, T> AsyncOverlayContext<V, T> {
    pub(crate) fn new(inner: OverlayContext<V>, resolver: Resolver<T>) -> Self {
        Self { inner, resolver }
    }

    pub fn overlay_id(&self) -> OverlayId {
        self.inner.overlay_id()
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Resolve the pending response with `value` and close the overlay.
    /// Only the first value is delivered.
    pub fn close(&self, value: T) {
        match self.resolver.take() {
            Some(sender) => {
                if sender.send(value).is_err() {
                    trace!("Response for overlay {} was dropped", self.overlay_id());
                }
            }
            None => trace!("Overlay {} already resolved", self.overlay_id()),
        }

        self.inner.close();
    }

    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// The plain context, for code that only needs close/unmount
    pub fn context(&self) -> &OverlayContext<V> {
        &self.inner
    }
}

impl<V, T> Clone for AsyncOverlayContext<V, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<V, T> fmt::Debug for AsyncOverlayContext<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOverlayContext")
            .field("overlay_id", &self.overlay_id())
            .field("is_open", &self.is_open())
            .finish()
    }
}

/// Pending result of an overlay opened with `open_async`.
///
/// Resolves to `Some(value)` when the overlay is closed with a value, or to
/// `None` once the overlay is unmounted without one.
pub struct OverlayResponse<T> {
    id: OverlayId,
    receiver: oneshot::Receiver<T>,
}

impl<T> OverlayResponse<T> {
    pub(crate) fn new(id: OverlayId, receiver: oneshot::Receiver<T>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    /// Check the response without waiting.
    ///
    /// `Ready(Some(value))` once answered, `Ready(None)` once the overlay was
    /// unmounted without an answer. A response is only taken once.
    pub fn try_take(&mut self) -> Poll<Option<T>> {
        match self.receiver.try_recv() {
            Ok(value) => Poll::Ready(Some(value)),
            Err(oneshot::error::TryRecvError::Empty) => Poll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => Poll::Ready(None),
        }
    }
}

impl<T> Future for OverlayResponse<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(Result::ok)
    }
}

impl<T> fmt::Debug for OverlayResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayResponse").field("id", &self.id).finish()
    }
}
