//! Static event registry.
//!
//! An emitter is parameterized over an [`EventMap`]: a closed set of event keys,
//! each bound to one payload type. Keys are zero-sized marker values, so a call
//! like `emitter.on(Ready, |port| ...)` reads like a string-keyed emitter while
//! the compiler checks both the key and the payload shape.
//!
//! # Example
//!
//! ```
//! use otter_emitter::{events, Emitter, Extend};
//!
//! events! {
//!     /// Events every connection emits.
//!     pub struct ConnectionEvents {
//!         Open: (),
//!         Close = "close": Option<String>,
//!     }
//! }
//!
//! events! {
//!     pub struct ServerOwnEvents {
//!         Listening: u16,
//!     }
//! }
//!
//! // A derived emitter carries the base events plus its own.
//! type ServerEvents = Extend<ConnectionEvents, ServerOwnEvents>;
//!
//! let emitter: Emitter<ServerEvents> = Emitter::new();
//! emitter
//!     .on(Listening, |port| assert_eq!(*port, 8080))
//!     .on(Close, |reason| assert!(reason.is_none()));
//! emitter.emit(Listening, 8080).emit(Close, None);
//! ```

use std::marker::PhantomData;

/// An event key bound to a payload type.
///
/// Implemented by the zero-sized markers generated by [`events!`](crate::events).
pub trait Event: Copy + 'static {
    /// Values delivered to listeners. Use a tuple for multi-value payloads.
    type Payload: Send + 'static;

    /// Human-readable event name used in logs and [`Emitter::event_names`](crate::Emitter::event_names).
    const NAME: &'static str;
}

/// A closed set of events an emitter accepts.
pub trait EventMap: 'static {}

/// Proof that map `Self` carries event `E`.
///
/// `I` records where the event was found (directly, or through one side of an
/// [`Extend`]). It is inferred at every call site and never written by hand.
pub trait Declares<E: Event, I = Local>: EventMap {}

/// Index: the map declares the event itself.
pub enum Local {}

/// Index: the event comes from the base map of an [`Extend`].
pub struct Base<I>(PhantomData<I>);

/// Index: the event comes from the extension map of an [`Extend`].
pub struct Own<I>(PhantomData<I>);

/// Event map of a derived emitter: every event of `B` plus every event of `X`.
///
/// Extensions nest, so `Extend<Extend<A, B>, C>` carries the events of all three.
/// Declaring the same marker on both sides makes call sites ambiguous, which the
/// compiler reports as an error.
pub struct Extend<B, X>(PhantomData<fn() -> (B, X)>);

impl<B: EventMap, X: EventMap> EventMap for Extend<B, X> {}

impl<B, X, E, I> Declares<E, Base<I>> for Extend<B, X>
where
    B: Declares<E, I>,
    X: EventMap,
    E: Event,
{
}

impl<B, X, E, I> Declares<E, Own<I>> for Extend<B, X>
where
    B: EventMap,
    X: Declares<E, I>,
    E: Event,
{
}

/// Declare an event map and its event markers.
///
/// Each entry is `Marker: PayloadType`, optionally renamed with
/// `Marker = "name": PayloadType`. The name defaults to the marker identifier.
///
/// ```
/// use otter_emitter::{events, Event};
///
/// events! {
///     pub struct SocketEvents {
///         Connect: (),
///         Data = "data": (u32, Vec<u8>),
///     }
/// }
///
/// assert_eq!(<Connect as Event>::NAME, "Connect");
/// assert_eq!(<Data as Event>::NAME, "data");
/// ```
#[macro_export]
macro_rules! events {
    (@name $event:ident) => {
        stringify!($event)
    };
    (@name $event:ident, $name:literal) => {
        $name
    };
    (
        $(#[$map_meta:meta])*
        $vis:vis struct $map:ident {
            $(
                $(#[$event_meta:meta])*
                $event:ident $(= $name:literal)? : $payload:ty
            ),* $(,)?
        }
    ) => {
        $(#[$map_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $map;

        impl $crate::EventMap for $map {}

        $(
            $(#[$event_meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            $vis struct $event;

            impl $crate::Event for $event {
                type Payload = $payload;
                const NAME: &'static str = $crate::events!(@name $event $(, $name)?);
            }

            impl $crate::Declares<$event> for $map {}
        )*
    };
}
