//! Inline order checking for feature streams.

use crate::error::{RecordPos, Result, RodError};
use crate::location::GenomeLocation;

/// Inline sort validator for use within streaming loops.
///
/// Validates that features arrive in non-decreasing (contig rank, start,
/// stop) order. A violation reports both the previous and the offending
/// location; nothing is reordered.
#[derive(Debug, Default)]
pub struct OrderGuard {
    previous: Option<GenomeLocation>,
    record_count: usize,
}

impl OrderGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that `location` keeps the stream sorted.
    #[inline]
    pub fn check(&mut self, track: &str, location: &GenomeLocation, at: RecordPos) -> Result<()> {
        self.record_count += 1;

        if let Some(previous) = &self.previous {
            if location < previous {
                return Err(RodError::UnsortedInput {
                    track: track.to_string(),
                    record: self.record_count,
                    at,
                    previous: previous.to_string(),
                    current: location.to_string(),
                });
            }
        }

        self.previous = Some(location.clone());
        Ok(())
    }

    /// Forget the last location, e.g. after the stream was repositioned.
    ///
    /// The record count is kept so diagnostics stay meaningful.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn previous(&self) -> Option<&GenomeLocation> {
        self.previous.as_ref()
    }
}
