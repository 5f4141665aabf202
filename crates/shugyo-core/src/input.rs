//! Duration entry: slider bounds and free-form minutes/seconds input.
//!
//! Everything here produces whole seconds of at least [`MIN_DURATION_SECS`],
//! so a parsed value can always be handed to the controller.

use serde::{Deserialize, Serialize};

use crate::error::InputError;

pub const MIN_DURATION_SECS: u64 = 1;

/// Largest minutes value accepted by free-form entry.
pub const MAX_INPUT_MINUTES: u64 = 99;

/// Largest seconds value accepted by free-form entry.
pub const MAX_INPUT_SECONDS: u64 = 59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderRange {
    pub min: u64,
    pub max: u64,
    pub step: u64,
}

impl SliderRange {
    /// Clamp into `[min, max]` and snap to the nearest step from `min`.
    pub fn snap(&self, secs: u64) -> u64 {
        let clamped = secs.clamp(self.min, self.max);
        if self.step == 0 {
            return clamped;
        }
        let offset = clamped - self.min;
        let steps = (offset + self.step / 2) / self.step;
        (self.min + steps * self.step).min(self.max)
    }

    pub fn contains(&self, secs: u64) -> bool {
        (self.min..=self.max).contains(&secs)
    }
}

pub const PRACTICE_SLIDER: SliderRange = SliderRange {
    min: 30,
    max: 600,
    step: 30,
};

pub const REST_SLIDER: SliderRange = SliderRange {
    min: 10,
    max: 300,
    step: 10,
};

pub fn clamp_duration(secs: u64) -> u64 {
    secs.max(MIN_DURATION_SECS)
}

/// Keep only ASCII digits; an empty result reads as 0.
fn digits_value(raw: &str) -> u64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    // Overlong input saturates and is clamped by the caller.
    digits
        .parse::<u64>()
        .unwrap_or(if digits.is_empty() { 0 } else { u64::MAX })
}

/// Combine separate minutes and seconds fields.
///
/// Non-digit characters are dropped, minutes are capped at 99 and seconds at
/// 59, and the total is at least one second.
///
/// # Errors
/// [`InputError::Empty`] if both fields are blank.
pub fn from_minutes_seconds(minutes: &str, seconds: &str) -> Result<u64, InputError> {
    if minutes.trim().is_empty() && seconds.trim().is_empty() {
        return Err(InputError::Empty);
    }
    let m = digits_value(minutes).min(MAX_INPUT_MINUTES);
    let s = digits_value(seconds).min(MAX_INPUT_SECONDS);
    Ok(clamp_duration(m * 60 + s))
}

/// Split a duration back into the `(minutes, seconds)` entry fields.
pub fn split_minutes_seconds(secs: u64) -> (u64, u64) {
    (secs / 60, secs % 60)
}

/// Parse `"90"` (seconds) or `"mm:ss"`.
///
/// # Errors
/// [`InputError::Empty`] for blank input, [`InputError::NotANumber`] if a
/// part is not a plain number.
pub fn parse_duration(raw: &str) -> Result<u64, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InputError::Empty);
    }
    let number = |part: &str| {
        part.trim()
            .parse::<u64>()
            .map_err(|_| InputError::NotANumber(raw.to_string()))
    };
    match raw.split_once(':') {
        Some((m, s)) => {
            let m = number(m)?.min(MAX_INPUT_MINUTES);
            let s = number(s)?.min(MAX_INPUT_SECONDS);
            Ok(clamp_duration(m * 60 + s))
        }
        None => Ok(clamp_duration(number(raw)?)),
    }
}
