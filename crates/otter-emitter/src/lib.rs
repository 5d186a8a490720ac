//! Otter Emitter - typed in-process event emitter
//!
//! Listeners register against event keys and are called synchronously, in
//! registration order, whenever the event is emitted.
//!
//! # Usage
//!
//! ```
//! use otter_emitter::{events, Callback, Emitter, Listener};
//!
//! events! {
//!     pub struct StreamEvents {
//!         Data = "data": Vec<u8>,
//!         End = "end": (),
//!     }
//! }
//!
//! let emitter: Emitter<StreamEvents> = Emitter::new();
//!
//! // Closures with no handle can only be removed by `off_event`/`off_all`.
//! emitter.on(Data, |chunk| println!("{} bytes", chunk.len()));
//!
//! // A handle makes the listener removable by identity.
//! let on_end = Callback::new(|_: &()| println!("done"));
//! emitter.once_with(End, Listener::new(on_end.clone()).protect(true));
//!
//! emitter.emit(Data, b"hello".to_vec());
//! emitter.off_all();                 // protected `end` listener survives
//! emitter.off(End, &on_end);         // exact removal ignores protection
//! assert!(emitter.is_empty());
//! ```
//!
//! # Semantics
//!
//! - **Order**: appended listeners run in registration order; prepended ones
//!   run first, most recently prepended first.
//! - **Snapshot**: `emit` copies the listener list before calling anything, so
//!   listeners added or removed during a pass only affect later passes.
//! - **Once**: a once-listener is removed right after the first emission its
//!   filter accepts.
//! - **Protection**: protected listeners survive `off_event` and `off_all`;
//!   `off(event, &callback)` always removes.
//! - **Deferred**: `next`/`next_matching` return a future for the next
//!   matching payload, backed by a protected once-listener.
//! - **Failures**: a panicking listener aborts the pass and the panic reaches
//!   the caller of `emit`, unless [`EmitterConfig::isolate_panics`] is set or
//!   [`Emitter::try_emit`] is used.

mod config;
mod deferred;
mod emitter;
mod error;
mod event;
mod listener;

pub use config::{DEFAULT_MAX_LISTENERS, EmitterConfig};
pub use deferred::Deferred;
pub use emitter::Emitter;
pub use error::{EmitterError, EmitterResult};
pub use event::{Base, Declares, Event, EventMap, Extend, Local, Own};
pub use listener::{Callback, Filter, Listener};
