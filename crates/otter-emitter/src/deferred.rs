//! Single-shot future for the callback-less `once` forms.
//!
//! [`Emitter::next`](crate::Emitter::next) registers a protected once-listener
//! whose callback is a shim holding the sending half of a oneshot channel. The
//! shim fires at most once; when the entry goes away without firing, the
//! sender is dropped with it and the future resolves to
//! [`EmitterError::Detached`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{EmitterError, EmitterResult};
use crate::listener::{Callback, WeakCallback};

/// Payload of the next matching emission of one event.
///
/// Has no timeout of its own. To give up waiting, race it against a timer and
/// remove the shim with `emitter.off(event, &callback)`, using the handle from
/// [`Deferred::callback`]; otherwise the protected entry stays registered
/// until the event fires.
#[must_use = "a Deferred does nothing unless awaited"]
pub struct Deferred<P> {
    rx: oneshot::Receiver<P>,
    callback: WeakCallback<P>,
    event: &'static str,
}

impl<P> Deferred<P>
where
    P: Clone + Send + 'static,
{
    /// Build the future and the shim callback that resolves it.
    pub(crate) fn channel(event: &'static str) -> (Self, Callback<P>) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let callback = Callback::new(move |payload: &P| {
            if let Some(tx) = tx.lock().take() {
                // Receiver may already be gone; nothing to resolve then.
                let _ = tx.send(payload.clone());
            }
        });
        let deferred = Self {
            rx,
            callback: callback.downgrade(),
            event,
        };
        (deferred, callback)
    }
}

impl<P> Deferred<P> {
    /// Name of the event this value waits on.
    pub fn event(&self) -> &'static str {
        self.event
    }

    /// Handle of the shim listener, while it is still registered.
    ///
    /// Returns `None` once the shim has been dropped (it fired and was removed,
    /// or it was removed some other way).
    pub fn callback(&self) -> Option<Callback<P>> {
        self.callback.upgrade()
    }

    /// Non-blocking check for a result.
    ///
    /// `None` while still waiting; `Some(Ok(_))` once the event fired;
    /// `Some(Err(_))` once the shim is gone without firing.
    pub fn try_take(&mut self) -> Option<EmitterResult<P>> {
        match self.rx.try_recv() {
            Ok(payload) => Some(Ok(payload)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EmitterError::Detached {
                event: self.event,
            })),
        }
    }
}

impl<P> Future for Deferred<P> {
    type Output = EmitterResult<P>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let event = this.event;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| EmitterError::Detached { event }))
    }
}

impl<P> std::fmt::Debug for Deferred<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("event", &self.event)
            .field("attached", &self.callback.upgrade().is_some())
            .finish()
    }
}
