//! Listener handles and registration options.
//!
//! A [`Callback`] is the identity of a listener: `off(event, &callback)` removes
//! the first entry registered with a clone of that exact handle. Closures passed
//! straight to `on`/`once` get a fresh handle nobody else holds, so they can only
//! be removed by the untargeted forms.

use std::fmt;
use std::sync::{Arc, Weak};

type CallbackFn<P> = dyn Fn(&P) + Send + Sync;
type FilterFn<P> = dyn Fn(&P) -> bool + Send + Sync;

/// Shared handle to a listener callback.
///
/// Cloning is cheap and clones compare equal by identity. Two handles built
/// from separate `Callback::new` calls never compare equal, even when built
/// from the same closure.
pub struct Callback<P> {
    inner: Arc<CallbackFn<P>>,
}

impl<P> Callback<P> {
    /// Wrap a closure in a new handle.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Invoke the callback.
    pub fn call(&self, payload: &P) {
        (self.inner)(payload)
    }

    /// Whether both handles refer to the same registered callback.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle that does not keep the closure alive.
    pub(crate) fn downgrade(&self) -> WeakCallback<P> {
        WeakCallback {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Weak counterpart of [`Callback`].
pub(crate) struct WeakCallback<P> {
    inner: Weak<CallbackFn<P>>,
}

impl<P> WeakCallback<P> {
    pub(crate) fn upgrade(&self) -> Option<Callback<P>> {
        self.inner.upgrade().map(|inner| Callback { inner })
    }
}

impl<P> Clone for Callback<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PartialEq for Callback<P> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<P> Eq for Callback<P> {}

impl<P> fmt::Debug for Callback<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

/// Predicate gating whether a listener fires for a payload.
pub struct Filter<P> {
    inner: Arc<FilterFn<P>>,
}

impl<P> Filter<P> {
    /// Wrap a predicate.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Evaluate the predicate.
    pub fn accepts(&self, payload: &P) -> bool {
        (self.inner)(payload)
    }
}

impl<P> Clone for Filter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Filter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// A callback plus its registration options, passed to the `*_with` methods.
///
/// ```
/// use otter_emitter::{Callback, Listener};
///
/// let cb = Callback::new(|name: &String| println!("hello {name}"));
/// let listener = Listener::new(cb.clone())
///     .filter(|name: &String| !name.is_empty())
///     .protect(true);
/// assert!(listener.is_protected());
/// ```
pub struct Listener<P> {
    callback: Callback<P>,
    filter: Option<Filter<P>>,
    protect: bool,
}

impl<P> Listener<P> {
    /// Listener for an existing handle, unfiltered and unprotected.
    pub fn new(callback: Callback<P>) -> Self {
        Self {
            callback,
            filter: None,
            protect: false,
        }
    }

    /// Listener for a closure, wrapped in a fresh handle.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self::new(Callback::new(f))
    }

    /// Only fire when `f` returns true for the emitted payload.
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Filter::new(f));
        self
    }

    /// Survive `off_event` and `off_all`. Exact `off` still removes it.
    pub fn protect(mut self, protect: bool) -> Self {
        self.protect = protect;
        self
    }

    /// The handle this listener is registered under.
    pub fn callback(&self) -> &Callback<P> {
        &self.callback
    }

    /// Whether the listener is protected from untargeted removal.
    pub fn is_protected(&self) -> bool {
        self.protect
    }

    pub(crate) fn into_entry(self, once: bool) -> Entry<P> {
        Entry {
            callback: self.callback,
            filter: self.filter,
            once,
            protect: self.protect,
        }
    }
}

impl<P> Clone for Listener<P> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            filter: self.filter.clone(),
            protect: self.protect,
        }
    }
}

impl<P> fmt::Debug for Listener<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("callback", &self.callback)
            .field("filtered", &self.filter.is_some())
            .field("protect", &self.protect)
            .finish()
    }
}

/// One registered listener as stored in the event table.
pub(crate) struct Entry<P> {
    pub(crate) callback: Callback<P>,
    pub(crate) filter: Option<Filter<P>>,
    pub(crate) once: bool,
    pub(crate) protect: bool,
}

impl<P> Entry<P> {
    /// Whether the entry's filter lets `payload` through. No filter always passes.
    pub(crate) fn accepts(&self, payload: &P) -> bool {
        self.filter.as_ref().is_none_or(|f| f.accepts(payload))
    }
}

impl<P> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            filter: self.filter.clone(),
            once: self.once,
            protect: self.protect,
        }
    }
}
