/// Per-call diagnostic switch.
///
/// Progress lines are only emitted through `tracing` when the caller asked for them, so concurrent
/// calls can run with different verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugLog {
    enabled: bool,
}

impl DebugLog {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub const fn enabled(self) -> bool {
        self.enabled
    }
}

macro_rules! debug_log {
    ($log:expr, $($arg:tt)+) => {
        if $log.enabled() {
            tracing::debug!($($arg)+);
        }
    };
}

pub(crate) use debug_log;
