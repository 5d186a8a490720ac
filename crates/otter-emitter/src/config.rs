//! Configuration for [`Emitter`](crate::Emitter) instances.

/// Default maximum number of listeners per event before a leak warning.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// Emitter settings.
///
/// Neither setting changes the registration or removal contract: registration
/// always succeeds and only dispatch behavior around panics is configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Listener count per event above which a leak warning is logged.
    /// `0` disables the warning.
    /// Default: 10
    pub max_listeners: usize,

    /// Catch panics from listeners and filters so the rest of the pass still runs.
    /// Default: false (a panic aborts the pass and propagates out of `emit`)
    pub isolate_panics: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
            isolate_panics: false,
        }
    }
}

impl EmitterConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that isolates listener panics.
    pub fn isolated() -> Self {
        Self {
            isolate_panics: true,
            ..Default::default()
        }
    }

    /// Set the per-event listener warning threshold (`0` = unlimited).
    pub fn max_listeners(mut self, n: usize) -> Self {
        self.max_listeners = n;
        self
    }

    /// Enable or disable listener panic isolation.
    pub fn isolate_panics(mut self, enabled: bool) -> Self {
        self.isolate_panics = enabled;
        self
    }

    /// Whether `count` listeners on one event has just crossed the warning threshold.
    pub(crate) fn crosses_limit(&self, count: usize) -> bool {
        self.max_listeners > 0 && count == self.max_listeners + 1
    }
}
