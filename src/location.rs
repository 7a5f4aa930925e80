//! Genomic locations: closed, 1-based intervals on a ranked contig.
//!
//! Locations are built through a [`ContigOrder`](crate::contig::ContigOrder),
//! which checks the contig and coordinates and stamps the contig's rank on
//! the value. Ordering is by rank, then start, then stop.

use crate::error::{Result, RodError};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A closed, 1-based genomic interval `contig:start-stop`.
///
/// Invariants: `1 <= start <= stop`, and `rank` is the index of `contig`
/// in the dictionary that built the location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomeLocation {
    contig: Arc<str>,
    rank: u32,
    start: u64,
    stop: u64,
}

impl GenomeLocation {
    /// Assemble a location from already-validated parts.
    #[inline]
    pub(crate) fn from_parts(contig: Arc<str>, rank: u32, start: u64, stop: u64) -> Self {
        debug_assert!(start >= 1 && start <= stop);
        Self {
            contig,
            rank,
            start,
            stop,
        }
    }

    /// Same contig, new bounds. Callers guarantee `1 <= start <= stop`.
    #[inline]
    pub(crate) fn with_bounds(&self, start: u64, stop: u64) -> Self {
        Self::from_parts(self.contig.clone(), self.rank, start, stop)
    }

    #[inline]
    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// Shared handle to the contig name.
    #[inline]
    pub fn contig_arc(&self) -> &Arc<str> {
        &self.contig
    }

    /// Rank of the contig in the dictionary.
    #[inline]
    pub fn rank(&self) -> u32 {
        self.rank
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn stop(&self) -> u64 {
        self.stop
    }

    /// Number of bases covered (always at least 1).
    #[inline]
    pub fn size(&self) -> u64 {
        self.stop - self.start + 1
    }

    #[inline]
    pub fn is_single_base(&self) -> bool {
        self.start == self.stop
    }

    /// Convert back to 0-based, half-open coordinates `(start0, stop0)`.
    #[inline]
    pub fn to_zero_based(&self) -> (u64, u64) {
        (self.start - 1, self.stop)
    }

    #[inline]
    pub fn on_same_contig(&self, other: &GenomeLocation) -> bool {
        self.rank == other.rank
    }

    /// Same-contig intersection test.
    ///
    /// Comparing locations on different contigs is a caller bug and fails
    /// instead of quietly answering `false`.
    pub fn overlaps(&self, other: &GenomeLocation) -> Result<bool> {
        if !self.on_same_contig(other) {
            return Err(RodError::InvalidLocation(format!(
                "overlap test across contigs: {} vs {}",
                self, other
            )));
        }
        Ok(self.intersects(other))
    }

    /// Intersection test that treats different contigs as disjoint.
    #[inline]
    pub(crate) fn intersects(&self, other: &GenomeLocation) -> bool {
        self.rank == other.rank && self.stop >= other.start && other.stop >= self.start
    }

    /// True if `other` lies entirely within this location.
    #[inline]
    pub fn contains(&self, other: &GenomeLocation) -> bool {
        self.rank == other.rank && self.start <= other.start && self.stop >= other.stop
    }

    /// True if this location ends before `other` begins (earlier contig, or
    /// same contig with `stop < other.start`).
    #[inline]
    pub fn is_before(&self, other: &GenomeLocation) -> bool {
        match self.rank.cmp(&other.rank) {
            Ordering::Less => true,
            Ordering::Equal => self.stop < other.start,
            Ordering::Greater => false,
        }
    }

    /// True if this location begins after `other` ends.
    #[inline]
    pub fn is_past(&self, other: &GenomeLocation) -> bool {
        match self.rank.cmp(&other.rank) {
            Ordering::Greater => true,
            Ordering::Equal => self.start > other.stop,
            Ordering::Less => false,
        }
    }

    #[inline]
    pub fn starts_before(&self, other: &GenomeLocation) -> bool {
        (self.rank, self.start) < (other.rank, other.start)
    }

    /// True if the two locations overlap or touch end to end.
    #[inline]
    pub fn is_contiguous_with(&self, other: &GenomeLocation) -> bool {
        self.rank == other.rank
            && self.start <= other.stop.saturating_add(1)
            && other.start <= self.stop.saturating_add(1)
    }

    /// Union of two overlapping or adjacent locations on the same contig.
    pub fn merge(&self, other: &GenomeLocation) -> Result<GenomeLocation> {
        if !self.is_contiguous_with(other) {
            return Err(RodError::UnmergeableLocation {
                a: self.to_string(),
                b: other.to_string(),
            });
        }
        Ok(self.with_bounds(self.start.min(other.start), self.stop.max(other.stop)))
    }

    /// Smallest location spanning both endpoints; gaps are allowed.
    pub fn endpoint_span(&self, other: &GenomeLocation) -> Result<GenomeLocation> {
        if !self.on_same_contig(other) {
            return Err(RodError::InvalidLocation(format!(
                "cannot span locations on different contigs: {} vs {}",
                self, other
            )));
        }
        Ok(self.with_bounds(self.start.min(other.start), self.stop.max(other.stop)))
    }

    /// Overlapping part of two locations.
    pub fn intersect(&self, other: &GenomeLocation) -> Result<GenomeLocation> {
        if !self.overlaps(other)? {
            return Err(RodError::InvalidLocation(format!(
                "cannot intersect disjoint locations {} and {}",
                self, other
            )));
        }
        Ok(self.with_bounds(self.start.max(other.start), self.stop.min(other.stop)))
    }

    /// Remove `other` from this location, returning the remaining pieces in
    /// ascending order (zero, one or two of them).
    pub fn subtract(&self, other: &GenomeLocation) -> Result<Vec<GenomeLocation>> {
        if !self.overlaps(other)? {
            return Ok(vec![self.clone()]);
        }

        let mut pieces = Vec::with_capacity(2);

        // Left piece
        if self.start < other.start {
            pieces.push(self.with_bounds(self.start, other.start - 1));
        }

        // Right piece
        if self.stop > other.stop {
            pieces.push(self.with_bounds(other.stop + 1, self.stop));
        }

        Ok(pieces)
    }

    /// Distance between start positions, or `None` across contigs.
    #[inline]
    pub fn distance(&self, other: &GenomeLocation) -> Option<u64> {
        self.on_same_contig(other)
            .then(|| self.start.abs_diff(other.start))
    }

    /// Gap between the two intervals: 0 when they overlap, `None` across
    /// contigs.
    pub fn min_distance(&self, other: &GenomeLocation) -> Option<u64> {
        if !self.on_same_contig(other) {
            return None;
        }
        if self.is_before(other) {
            Some(other.start - self.stop)
        } else if other.is_before(self) {
            Some(self.start - other.stop)
        } else {
            Some(0)
        }
    }

    /// Single-base location at the start.
    #[inline]
    pub fn start_location(&self) -> GenomeLocation {
        self.with_bounds(self.start, self.start)
    }

    /// Single-base location at the stop.
    #[inline]
    pub fn stop_location(&self) -> GenomeLocation {
        self.with_bounds(self.stop, self.stop)
    }
}

impl fmt::Display for GenomeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.stop {
            write!(f, "{}:{}", self.contig, self.start)
        } else {
            write!(f, "{}:{}-{}", self.contig, self.start, self.stop)
        }
    }
}

impl Ord for GenomeLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then(self.start.cmp(&other.start))
            .then(self.stop.cmp(&other.stop))
    }
}

impl PartialOrd for GenomeLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
