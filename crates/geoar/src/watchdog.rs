//! GPS liveness watchdog.
//!
//! Driven by a one-second timer. If ten ticks pass without a fix, the
//! watchdog fires exactly once and stops; any fix disarms it for good.

/// Ticks without a fix before the GPS is declared stalled.
pub const STALL_TICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Armed { ticks: u32 },
    Disarmed,
    Fired,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Still counting.
    Waiting,
    /// The window elapsed on this tick. Reported once.
    Stalled,
    /// The watchdog is no longer running.
    Idle,
}

/// Counts silent seconds until the first fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsWatchdog {
    state: State,
}

impl Default for GpsWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsWatchdog {
    /// An armed watchdog with no ticks counted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Armed { ticks: 0 },
        }
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> WatchdogVerdict {
        match &mut self.state {
            State::Armed { ticks } => {
                *ticks += 1;
                if *ticks >= STALL_TICKS {
                    self.state = State::Fired;
                    WatchdogVerdict::Stalled
                } else {
                    WatchdogVerdict::Waiting
                }
            }
            State::Disarmed | State::Fired => WatchdogVerdict::Idle,
        }
    }

    /// A fix arrived; stop counting.
    pub fn on_fix(&mut self) {
        if matches!(self.state, State::Armed { .. }) {
            self.state = State::Disarmed;
        }
    }

    /// True while ticks are still being counted.
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Armed { .. })
    }

    /// True once the stall has been reported.
    pub fn has_fired(&self) -> bool {
        self.state == State::Fired
    }
}
