//! The emitter: an event table plus registration, removal and dispatch.
//!
//! Dispatch works on a snapshot of the listener list taken under the lock, and
//! the lock is released before any filter or callback runs:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!   - Listeners may call back into the emitter without deadlocking.
//!
//! The table never holds an empty list; an event key is present exactly while
//! at least one listener is registered for it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::config::EmitterConfig;
use crate::deferred::Deferred;
use crate::error::{EmitterError, EmitterResult};
use crate::event::{Declares, Event, EventMap};
use crate::listener::{Callback, Entry, Filter, Listener};

/// Type-erased listener list for one event key.
trait Slot: Send {
    fn name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every unprotected entry out into a new slot.
    fn take_unprotected(&mut self) -> Box<dyn Slot>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Listener list for one event, in invocation order.
struct Listeners<P> {
    name: &'static str,
    entries: Vec<Entry<P>>,
}

impl<P> Listeners<P> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// Remove the first entry registered under `callback`.
    fn remove_first(&mut self, callback: &Callback<P>) -> Option<Entry<P>> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.callback.same_as(callback))?;
        Some(self.entries.remove(pos))
    }
}

impl<P: 'static> Slot for Listeners<P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn take_unprotected(&mut self) -> Box<dyn Slot> {
        let (kept, removed): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|entry| entry.protect);
        self.entries = kept;
        Box::new(Listeners {
            name: self.name,
            entries: removed,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Table = HashMap<TypeId, Box<dyn Slot>>;

fn listeners<E: Event>(table: &Table) -> Option<&Listeners<E::Payload>> {
    table
        .get(&TypeId::of::<E>())
        .and_then(|slot| slot.as_any().downcast_ref())
}

fn listeners_mut<E: Event>(table: &mut Table) -> Option<&mut Listeners<E::Payload>> {
    table
        .get_mut(&TypeId::of::<E>())
        .and_then(|slot| slot.as_any_mut().downcast_mut())
}

/// Where a new entry goes in its event's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Append,
    Prepend,
}

/// Typed synchronous event emitter over the events declared by `M`.
///
/// All methods take `&self`. Internal state is protected by a
/// `parking_lot::Mutex` that is never held while filters or callbacks run.
/// Mutating methods return `&Self` so calls chain.
///
/// ```
/// use otter_emitter::{events, Emitter};
///
/// events! {
///     pub struct JobEvents {
///         Progress: (u32, u32),
///         Done: (),
///     }
/// }
///
/// let emitter: Emitter<JobEvents> = Emitter::new();
/// emitter
///     .on(Progress, |(done, total)| println!("{done}/{total}"))
///     .once(Done, |_| println!("finished"));
///
/// emitter.emit(Progress, (1, 2)).emit(Done, ()).emit(Done, ());
/// assert!(!emitter.has_listeners(Done));
/// ```
pub struct Emitter<M> {
    table: Mutex<Table>,
    config: EmitterConfig,
    _map: PhantomData<fn() -> M>,
}

impl<M: EventMap> Emitter<M> {
    /// Create an empty emitter with default settings.
    pub fn new() -> Self {
        Self::with_config(EmitterConfig::default())
    }

    /// Create an empty emitter with explicit settings.
    pub fn with_config(config: EmitterConfig) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            config,
            _map: PhantomData,
        }
    }

    /// Settings this emitter was built with.
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Append a listener that fires on every emission of `event`.
    pub fn on<E, I, F>(&self, event: E, callback: F) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        self.on_with::<E, I>(event, Listener::from_fn(callback))
    }

    /// Append a listener with a handle, filter or protection.
    pub fn on_with<E, I>(&self, _event: E, listener: Listener<E::Payload>) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        self.register::<E>(listener.into_entry(false), Position::Append);
        self
    }

    /// Prepend a listener so it runs before everything already registered.
    pub fn prepend_on<E, I, F>(&self, event: E, callback: F) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        self.prepend_on_with::<E, I>(event, Listener::from_fn(callback))
    }

    /// Prepend a listener with a handle, filter or protection.
    pub fn prepend_on_with<E, I>(&self, _event: E, listener: Listener<E::Payload>) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        self.register::<E>(listener.into_entry(false), Position::Prepend);
        self
    }

    /// Append a listener that is removed after its first firing.
    pub fn once<E, I, F>(&self, event: E, callback: F) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        self.once_with::<E, I>(event, Listener::from_fn(callback))
    }

    /// Append a once-listener with a handle, filter or protection.
    ///
    /// Emissions rejected by the filter do not consume the single firing.
    pub fn once_with<E, I>(&self, _event: E, listener: Listener<E::Payload>) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        self.register::<E>(listener.into_entry(true), Position::Append);
        self
    }

    /// Prepend a listener that is removed after its first firing.
    pub fn prepend_once<E, I, F>(&self, event: E, callback: F) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
        F: Fn(&E::Payload) + Send + Sync + 'static,
    {
        self.prepend_once_with::<E, I>(event, Listener::from_fn(callback))
    }

    /// Prepend a once-listener with a handle, filter or protection.
    pub fn prepend_once_with<E, I>(&self, _event: E, listener: Listener<E::Payload>) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        self.register::<E>(listener.into_entry(true), Position::Prepend);
        self
    }

    /// Resolve with the payload of the next emission of `event`.
    ///
    /// The backing listener is always protected: only its own firing or an
    /// exact `off` with [`Deferred::callback`] removes it.
    pub fn next<E, I>(&self, _event: E) -> Deferred<E::Payload>
    where
        E: Event,
        M: Declares<E, I>,
        E::Payload: Clone,
    {
        self.register_deferred::<E>(None, Position::Append)
    }

    /// Resolve with the payload of the next emission of `event` accepted by `filter`.
    pub fn next_matching<E, I, F>(&self, _event: E, filter: F) -> Deferred<E::Payload>
    where
        E: Event,
        M: Declares<E, I>,
        E::Payload: Clone,
        F: Fn(&E::Payload) -> bool + Send + Sync + 'static,
    {
        self.register_deferred::<E>(Some(Filter::new(filter)), Position::Append)
    }

    /// Like [`next`](Self::next), but the backing listener runs before existing ones.
    pub fn prepend_next<E, I>(&self, _event: E) -> Deferred<E::Payload>
    where
        E: Event,
        M: Declares<E, I>,
        E::Payload: Clone,
    {
        self.register_deferred::<E>(None, Position::Prepend)
    }

    /// Like [`next_matching`](Self::next_matching), but the backing listener runs first.
    pub fn prepend_next_matching<E, I, F>(&self, _event: E, filter: F) -> Deferred<E::Payload>
    where
        E: Event,
        M: Declares<E, I>,
        E::Payload: Clone,
        F: Fn(&E::Payload) -> bool + Send + Sync + 'static,
    {
        self.register_deferred::<E>(Some(Filter::new(filter)), Position::Prepend)
    }

    fn register_deferred<E: Event>(
        &self,
        filter: Option<Filter<E::Payload>>,
        position: Position,
    ) -> Deferred<E::Payload>
    where
        E::Payload: Clone,
    {
        let (deferred, callback) = Deferred::channel(E::NAME);
        let entry = Entry {
            callback,
            filter,
            once: true,
            protect: true,
        };
        self.register::<E>(entry, position);
        deferred
    }

    fn register<E: Event>(&self, entry: Entry<E::Payload>, position: Position) {
        let (once, protect) = (entry.once, entry.protect);
        let count = {
            let mut table = self.table.lock();
            let slot = table
                .entry(TypeId::of::<E>())
                .or_insert_with(|| Box::new(Listeners::<E::Payload>::new(E::NAME)));
            let Some(list) = slot.as_any_mut().downcast_mut::<Listeners<E::Payload>>() else {
                unreachable!("slot for `{}` holds a different payload type", E::NAME);
            };
            match position {
                Position::Append => list.entries.push(entry),
                Position::Prepend => list.entries.insert(0, entry),
            }
            list.entries.len()
        };

        trace!(event = E::NAME, ?position, once, protect, count, "listener registered");

        if self.config.crosses_limit(count) {
            warn!(
                event = E::NAME,
                count,
                max = self.config.max_listeners,
                "possible emitter leak: {count} `{}` listeners registered, raise max_listeners if intended",
                E::NAME
            );
        }
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    /// Remove the first listener registered under `callback`, protected or not.
    ///
    /// No-op when nothing matches.
    pub fn off<E, I>(&self, _event: E, callback: &Callback<E::Payload>) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        let removed = self.remove_first::<E>(callback);
        if removed.is_some() {
            trace!(event = E::NAME, "listener removed");
        }
        self
    }

    /// Remove every unprotected listener for `event`.
    pub fn off_event<E, I>(&self, _event: E) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        // Removed closures are dropped after the lock is released.
        let removed = {
            let mut table = self.table.lock();
            let key = TypeId::of::<E>();
            let Some(slot) = table.get_mut(&key) else {
                return self;
            };
            let removed = slot.take_unprotected();
            if slot.is_empty() {
                table.remove(&key);
            }
            removed
        };

        debug!(event = E::NAME, removed = removed.len(), "unprotected listeners removed");
        self
    }

    /// Remove every unprotected listener for every event.
    ///
    /// Only listeners present when the call starts are affected.
    pub fn off_all(&self) -> &Self {
        let removed: Vec<Box<dyn Slot>> = {
            let mut table = self.table.lock();
            let removed = table
                .values_mut()
                .map(|slot| slot.take_unprotected())
                .collect();
            table.retain(|_, slot| !slot.is_empty());
            removed
        };

        let count: usize = removed.iter().map(|slot| slot.len()).sum();
        debug!(removed = count, "unprotected listeners removed from all events");
        self
    }

    fn remove_first<E: Event>(&self, callback: &Callback<E::Payload>) -> Option<Entry<E::Payload>> {
        let mut table = self.table.lock();
        let list = listeners_mut::<E>(&mut table)?;
        let removed = list.remove_first(callback)?;
        if list.entries.is_empty() {
            table.remove(&TypeId::of::<E>());
        }
        Some(removed)
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Synchronously call every listener for `event` whose filter accepts `payload`.
    ///
    /// Listeners run in table order as of the call. Once-listeners that fire are
    /// removed from the live table right after their callback returns.
    ///
    /// A panicking listener or filter aborts the rest of the pass and the panic
    /// propagates to the caller, unless [`EmitterConfig::isolate_panics`] is set,
    /// in which case the panic is logged and the pass continues.
    pub fn emit<E, I>(&self, _event: E, payload: E::Payload) -> &Self
    where
        E: Event,
        M: Declares<E, I>,
    {
        self.dispatch::<E>(&payload, self.config.isolate_panics);
        self
    }

    /// Dispatch like [`emit`](Self::emit) with panics isolated, then report the
    /// first panic, if any, after every listener in the pass has run.
    pub fn try_emit<E, I>(&self, _event: E, payload: E::Payload) -> EmitterResult<&Self>
    where
        E: Event,
        M: Declares<E, I>,
    {
        match self.dispatch::<E>(&payload, true) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    fn dispatch<E: Event>(&self, payload: &E::Payload, isolate: bool) -> Option<EmitterError> {
        let snapshot: Vec<Entry<E::Payload>> = {
            let table = self.table.lock();
            listeners::<E>(&table)?.entries.clone()
        };

        trace!(event = E::NAME, listeners = snapshot.len(), "emit");

        let mut first_panic = None;
        for entry in &snapshot {
            match guard(E::NAME, isolate, || entry.accepts(payload)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    first_panic.get_or_insert(err);
                    continue;
                }
            }

            if let Err(err) = guard(E::NAME, isolate, || entry.callback.call(payload)) {
                first_panic.get_or_insert(err);
            }

            if entry.once {
                self.remove_first::<E>(&entry.callback);
            }
        }

        first_panic
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Number of listeners registered for `event`.
    pub fn listener_count<E, I>(&self, _event: E) -> usize
    where
        E: Event,
        M: Declares<E, I>,
    {
        let table = self.table.lock();
        table.get(&TypeId::of::<E>()).map_or(0, |slot| slot.len())
    }

    /// Whether any listener is registered for `event`.
    pub fn has_listeners<E, I>(&self, _event: E) -> bool
    where
        E: Event,
        M: Declares<E, I>,
    {
        self.table.lock().contains_key(&TypeId::of::<E>())
    }

    /// Names of all events that currently have listeners, in no particular order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.table.lock().values().map(|slot| slot.name()).collect()
    }

    /// Whether no listener is registered for any event.
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

/// Run listener code, catching panics when `isolate` is set.
fn guard<T>(event: &'static str, isolate: bool, f: impl FnOnce() -> T) -> Result<T, EmitterError> {
    if !isolate {
        return Ok(f());
    }
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let err = EmitterError::from_panic(event, &*payload);
        error!(event, label = err.as_label(), "{err}");
        err
    })
}

impl<M: EventMap> Default for Emitter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for Emitter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        let events: HashMap<&'static str, usize> =
            table.values().map(|slot| (slot.name(), slot.len())).collect();
        f.debug_struct("Emitter")
            .field("events", &events)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    crate::events! {
        struct TestEvents {
            Ping: u32,
            Pong: (),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        (hits, move |_: &u32| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_empty_emitter() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        assert!(emitter.is_empty());
        assert!(!emitter.has_listeners(Ping));
        assert_eq!(emitter.listener_count(Ping), 0);
        assert!(emitter.event_names().is_empty());

        // All of these are no-ops on an empty table.
        emitter.emit(Ping, 1).off_event(Ping).off_all();
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_prepend_goes_first() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        let a = Callback::new(|_: &u32| {});
        let b = Callback::new(|_: &u32| {});

        emitter
            .on_with(Ping, Listener::new(a.clone()))
            .prepend_on_with(Ping, Listener::new(b.clone()));

        let table = emitter.table.lock();
        let list = listeners::<Ping>(&table).expect("ping listeners");
        assert!(list.entries[0].callback.same_as(&b));
        assert!(list.entries[1].callback.same_as(&a));
    }

    #[test]
    fn test_key_removed_when_list_empties() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        let cb = Callback::new(|_: &u32| {});

        emitter.on_with(Ping, Listener::new(cb.clone()));
        assert!(emitter.has_listeners(Ping));

        emitter.off(Ping, &cb);
        assert!(!emitter.has_listeners(Ping));
        assert!(emitter.table.lock().is_empty());
    }

    #[test]
    fn test_off_event_keeps_protected_key() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        let (hits, cb) = counter();

        emitter
            .on(Ping, |_| {})
            .on_with(Ping, Listener::from_fn(cb).protect(true));
        emitter.off_event(Ping);

        assert_eq!(emitter.listener_count(Ping), 1);
        emitter.emit(Ping, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_entry_is_protected_once() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        let _deferred = emitter.next(Ping);

        let table = emitter.table.lock();
        let list = listeners::<Ping>(&table).expect("ping listeners");
        assert_eq!(list.entries.len(), 1);
        assert!(list.entries[0].once);
        assert!(list.entries[0].protect);
    }

    #[test]
    fn test_prepend_next_goes_in_front() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        let plain = Callback::new(|_: &u32| {});
        emitter.on_with(Ping, Listener::new(plain.clone()));

        let deferred = emitter.prepend_next(Ping);
        let _matching = emitter.prepend_next_matching(Ping, |n| *n > 1);
        let shim = deferred.callback().expect("shim is registered");

        let table = emitter.table.lock();
        let list = listeners::<Ping>(&table).expect("ping listeners");
        assert_eq!(list.entries.len(), 3);
        assert!(list.entries[0].once && list.entries[0].protect);
        assert!(list.entries[0].filter.is_some());
        assert!(list.entries[1].callback.same_as(&shim));
        assert!(list.entries[2].callback.same_as(&plain));
    }

    #[test]
    fn test_debug_lists_events() {
        let emitter: Emitter<TestEvents> = Emitter::new();
        emitter.on(Pong, |_| {});
        let rendered = format!("{emitter:?}");
        assert!(rendered.contains("Pong"));
        assert!(rendered.contains("max_listeners"));
    }
}
