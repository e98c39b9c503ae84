//! Tunables for the analytics layer.

use chrono::TimeDelta;

pub const DEFAULT_DELAY_THRESHOLD_MINUTES: i64 = 2;
pub const DEFAULT_MIN_DELAYED_STOPS: usize = 3;

/// Parameters the excluded query layer feeds into delay detection
///
/// With the `serde` feature, missing fields fall back to the defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalyticsConfig {
    /// A stop event is delayed when it arrives more than this many minutes late.
    pub delay_threshold_minutes: i64,
    /// Trips need at least this many delayed stops to be reported.
    pub min_delayed_stops: usize,
}

impl AnalyticsConfig {
    pub fn threshold(&self) -> TimeDelta {
        let minutes = self.delay_threshold_minutes;
        TimeDelta::try_minutes(minutes).unwrap_or(if minutes < 0 { TimeDelta::MIN } else { TimeDelta::MAX })
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            delay_threshold_minutes: DEFAULT_DELAY_THRESHOLD_MINUTES,
            min_delayed_stops: DEFAULT_MIN_DELAYED_STOPS,
        }
    }
}
