//! [`DebounceFilter`] – per-channel novelty filter for analog readings.
//!
//! Raw analog sampling is noisy and high-frequency. A reading is reported
//! only when it is the first one for its channel, when it differs from the
//! last reported value by at least [`CHANGE_THRESHOLD`], or when more than
//! [`HEARTBEAT`] has passed since the last report. Both constants are part of
//! the wire protocol and are not configurable.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use hatlink_runtime::debounce::DebounceFilter;
//!
//! let filter = DebounceFilter::new();
//! let t0 = Instant::now();
//!
//! assert!(filter.observe(0, 1.00, t0)); // first reading
//! assert!(!filter.observe(0, 1.05, t0 + Duration::from_millis(10))); // jitter
//! assert!(filter.observe(0, 1.05, t0 + Duration::from_millis(1001))); // heartbeat
//! ```

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use hatlink_types::ANALOG_CHANNELS;
use tracing::warn;

/// Minimum absolute change that counts as a new value.
pub const CHANGE_THRESHOLD: f64 = 0.1;

/// A value is re-reported once this much time has passed since the last
/// report, even if unchanged.
pub const HEARTBEAT: Duration = Duration::from_millis(1000);

/// Reference point for one analog channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebounceState {
    /// Last reported value and when it was reported. `None` until the first
    /// report.
    last: Option<(f64, Instant)>,
}

impl DebounceState {
    /// Decide whether `value` observed at `now` should be reported, and if
    /// so make it the new reference point.
    pub fn observe(&mut self, value: f64, now: Instant) -> bool {
        let emit = match self.last {
            None => true,
            Some((last_value, last_emit)) => {
                (value - last_value).abs() >= CHANGE_THRESHOLD
                    || now.saturating_duration_since(last_emit) > HEARTBEAT
            }
        };
        if emit {
            self.last = Some((value, now));
        }
        emit
    }

    /// The last reported value, if any.
    pub fn last_value(&self) -> Option<f64> {
        self.last.map(|(value, _)| value)
    }
}

/// Fixed bank of [`DebounceState`]s, one per analog channel.
///
/// Each channel has its own lock, so callbacks for different channels never
/// contend with each other.
pub struct DebounceFilter {
    channels: [Mutex<DebounceState>; ANALOG_CHANNELS],
}

impl DebounceFilter {
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| Mutex::new(DebounceState::default())),
        }
    }

    /// Run [`DebounceState::observe`] for `channel`.
    ///
    /// Readings on channels outside the bank are never reported.
    pub fn observe(&self, channel: usize, value: f64, now: Instant) -> bool {
        match self.channels.get(channel) {
            Some(state) => state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observe(value, now),
            None => {
                warn!(channel, value, "analog reading on unknown channel dropped");
                false
            }
        }
    }
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::new()
    }
}
