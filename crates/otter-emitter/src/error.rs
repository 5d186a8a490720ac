//! Error types for otter-emitter
//!
//! Registration, removal and dispatch never fail on table state. The only
//! failure surfaces are a deferred listener that goes away before it fires and
//! a listener that panics while `try_emit` (or panic isolation) is active.

use thiserror::Error;

/// Result type alias for emitter operations
pub type EmitterResult<T> = Result<T, EmitterError>;

/// Errors surfaced by the emitter
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// The listener behind a [`Deferred`](crate::Deferred) was removed, or the
    /// emitter dropped, before a matching emission arrived.
    #[error("listener for `{event}` was removed before it fired")]
    Detached {
        /// Name of the event the deferred value was waiting on.
        event: &'static str,
    },

    /// A listener or its filter panicked during dispatch.
    #[error("listener for `{event}` panicked: {message}")]
    ListenerPanicked {
        /// Name of the event being dispatched.
        event: &'static str,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl EmitterError {
    /// Short stable label (snake_case) for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitterError::Detached { .. } => "listener_detached",
            EmitterError::ListenerPanicked { .. } => "listener_panicked",
        }
    }

    /// Name of the event this error relates to.
    pub fn event(&self) -> &'static str {
        match self {
            EmitterError::Detached { event } | EmitterError::ListenerPanicked { event, .. } => {
                *event
            }
        }
    }

    /// Build a `ListenerPanicked` from a payload caught by `catch_unwind`.
    pub(crate) fn from_panic(event: &'static str, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::ListenerPanicked { event, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let detached = EmitterError::Detached { event: "ready" };
        assert_eq!(detached.as_label(), "listener_detached");
        assert_eq!(detached.event(), "ready");

        let panicked = EmitterError::ListenerPanicked {
            event: "data",
            message: "boom".into(),
        };
        assert_eq!(panicked.as_label(), "listener_panicked");
        assert_eq!(panicked.to_string(), "listener for `data` panicked: boom");
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = EmitterError::from_panic("x", &"static message");
        assert_eq!(
            err,
            EmitterError::ListenerPanicked {
                event: "x",
                message: "static message".into()
            }
        );

        let err = EmitterError::from_panic("x", &String::from("owned message"));
        assert!(err.to_string().ends_with("owned message"));

        let err = EmitterError::from_panic("x", &42u32);
        assert!(err.to_string().ends_with("non-string panic payload"));
    }
}
