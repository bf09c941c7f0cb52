//! Caller-supplied jump intervals.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when an interval list fails validation.
#[derive(Debug, Error, PartialEq)]
pub enum IntervalError {
    #[error("No jump intervals provided. Example: [[75.0, 78.0], [94.0, 96.0]]")]
    Empty,

    #[error("Invalid interval [{start}, {end}]: start must be less than end")]
    Degenerate { start: f64, end: f64 },
}

/// A `[start, end]` second range believed to contain one jump.
///
/// Serialized as a two-element array to match the caller contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct TimeInterval {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl TimeInterval {
    /// Create a new interval without validation.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Interval length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check the `start < end` invariant.
    pub fn validate(&self) -> Result<(), IntervalError> {
        if self.start < self.end {
            Ok(())
        } else {
            Err(IntervalError::Degenerate {
                start: self.start,
                end: self.end,
            })
        }
    }

    /// Validate a whole interval list before any work starts.
    ///
    /// An empty list or any degenerate interval fails the batch up front.
    pub fn validate_all(intervals: &[TimeInterval]) -> Result<(), IntervalError> {
        if intervals.is_empty() {
            return Err(IntervalError::Empty);
        }
        for interval in intervals {
            interval.validate()?;
        }
        Ok(())
    }
}

impl From<[f64; 2]> for TimeInterval {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<TimeInterval> for [f64; 2] {
    fn from(interval: TimeInterval) -> Self {
        [interval.start, interval.end]
    }
}
