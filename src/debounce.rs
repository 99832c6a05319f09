//! Digital classification and per-channel debouncing.
//!
//! Toggle switches and push-buttons are wired to ADC inputs, so a binary
//! state is recovered by thresholding the raw sample. Each digital channel
//! then carries a [`ChannelState`] that only lets a new level through when
//! it differs from the last accepted one and the last accepted change is
//! older than the debounce interval.

use std::time::{Duration, Instant};

/// Half of the 16-bit normalized range.
pub const DEFAULT_THRESHOLD: u16 = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// OSC payload for this level.
    pub fn value(self) -> i32 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalClassifier {
    threshold: u16,
}

impl Default for DigitalClassifier {
    fn default() -> Self {
        DigitalClassifier::new(DEFAULT_THRESHOLD)
    }
}

impl DigitalClassifier {
    pub fn new(threshold: u16) -> Self {
        DigitalClassifier { threshold }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// `High` only when the sample strictly exceeds the threshold.
    pub fn classify(&self, raw: u16) -> Level {
        if raw > self.threshold {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Last accepted level of a digital channel and when it was accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    last_value: Option<Level>,
    last_change: Option<Instant>,
}

impl ChannelState {
    pub fn new() -> Self {
        ChannelState::default()
    }

    pub fn last_value(&self) -> Option<Level> {
        self.last_value
    }

    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }

    /// Returns true when `new_level` is accepted as a change.
    ///
    /// A rejected attempt leaves the state untouched, so the window is
    /// always measured from the last *accepted* change.
    pub fn accept(&mut self, new_level: Level, now: Instant, min_interval: Duration) -> bool {
        if self.last_value == Some(new_level) {
            return false;
        }

        if let Some(last_change) = self.last_change {
            if now.saturating_duration_since(last_change) <= min_interval {
                return false;
            }
        }

        self.last_value = Some(new_level);
        self.last_change = Some(now);
        true
    }
}
