//! Sliding per-track window of features that can still overlap the cursor.
//!
//! Storage follows the Vec + head index pattern: evicted features before
//! `head_idx` are logically removed and only drained during compaction.

use crate::error::{Result, RodError};
use crate::feature::Feature;
use crate::location::GenomeLocation;

/// Compaction threshold - trigger when head_idx exceeds this value.
const COMPACTION_THRESHOLD: usize = 4096;

/// Lifecycle of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Nothing buffered; the source may have more.
    Empty,
    /// A cursor advance is pulling features in.
    Filling,
    /// Filled for the current cursor; the source has more.
    Ready,
    /// The source hit EOF; only the buffered remainder is left.
    Exhausted,
}

/// Buffered features of one track in ascending location order.
///
/// # Memory Complexity
///
/// O(k) where k = max number of features overlapping any cursor plus the
/// lookahead padding. Periodic compaction keeps evicted slots bounded.
#[derive(Debug)]
pub struct WindowBuffer<P> {
    track: String,
    /// Storage for buffered features.
    data: Vec<Feature<P>>,
    /// Index of the first logically buffered feature.
    head_idx: usize,
    /// Largest admissible feature span (bp).
    max_window: u64,
    state: WindowState,
    /// Maximum observed window size (for statistics).
    peak: usize,
}

impl<P> WindowBuffer<P> {
    pub fn new(track: impl Into<String>, max_window: u64) -> Self {
        Self {
            track: track.into(),
            data: Vec::with_capacity(64),
            head_idx: 0,
            max_window,
            state: WindowState::Empty,
            peak: 0,
        }
    }

    /// Append a feature at the tail.
    ///
    /// The caller guarantees ascending order. A feature spanning more than
    /// `max_window` bases fails with `WindowOverflow` and is not admitted.
    pub fn admit(&mut self, feature: Feature<P>) -> Result<()> {
        let span = feature.stop() - feature.start() + 1;
        if span > self.max_window {
            return Err(RodError::WindowOverflow {
                track: self.track.clone(),
                location: feature.location().to_string(),
                span,
                limit: self.max_window,
            });
        }
        debug_assert!(
            self.back().map_or(true, |b| b.location() <= feature.location()),
            "window admission out of order"
        );

        self.data.push(feature);
        self.update_peak();
        Ok(())
    }

    /// Mark the start of a fill.
    #[inline]
    pub fn begin_fill(&mut self) {
        if self.state != WindowState::Exhausted {
            self.state = WindowState::Filling;
        }
    }

    /// Mark the end of a fill.
    pub fn settle(&mut self, source_exhausted: bool) {
        self.state = if source_exhausted {
            WindowState::Exhausted
        } else if self.is_empty() {
            WindowState::Empty
        } else {
            WindowState::Ready
        };
    }

    #[inline]
    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Remove every feature entirely before `cursor`.
    ///
    /// Pops from the head first, then sweeps the rest: features are sorted
    /// by start, so a short feature can end before the cursor while a
    /// longer one ahead of it is still live.
    ///
    /// Returns the number of features removed.
    pub fn evict(&mut self, cursor: &GenomeLocation) -> usize {
        let mut removed = self.advance_while(|f| f.location().is_before(cursor));

        if self.iter().any(|f| f.location().is_before(cursor)) {
            self.data.drain(..self.head_idx);
            self.head_idx = 0;
            let before = self.data.len();
            self.data.retain(|f| !f.location().is_before(cursor));
            removed += before - self.data.len();
        }

        self.compact_if_needed();
        if self.state == WindowState::Ready && self.is_empty() {
            self.state = WindowState::Empty;
        }
        removed
    }

    /// Buffered features overlapping `cursor`, in ascending order.
    ///
    /// The iterator borrows only the window; `cursor` is copied into it.
    pub fn peek_overlap(&self, cursor: &GenomeLocation) -> impl Iterator<Item = &Feature<P>> + '_ {
        let bound = cursor.clone();
        let cursor = cursor.clone();
        self.iter()
            .take_while(move |f| !f.location().is_past(&bound))
            .filter(move |f| f.location().intersects(&cursor))
    }

    /// Get the number of logically buffered features.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.head_idx
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head_idx >= self.data.len()
    }

    /// Iterator over buffered features.
    pub fn iter(&self) -> impl Iterator<Item = &Feature<P>> {
        self.data[self.head_idx..].iter()
    }

    /// Get reference to the last admitted feature.
    #[inline]
    pub fn back(&self) -> Option<&Feature<P>> {
        if self.is_empty() {
            None
        } else {
            self.data.last()
        }
    }

    /// Drop everything, e.g. when the track is closed or its shard ends.
    pub fn clear(&mut self) {
        self.data.clear();
        self.head_idx = 0;
        if self.state != WindowState::Exhausted {
            self.state = WindowState::Empty;
        }
    }

    /// Get the maximum window size observed (for statistics).
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Advance head while condition is true for the front element.
    ///
    /// Returns the number of elements removed.
    #[inline]
    fn advance_while<F>(&mut self, mut condition: F) -> usize
    where
        F: FnMut(&Feature<P>) -> bool,
    {
        let start_idx = self.head_idx;
        while self.head_idx < self.data.len() && condition(&self.data[self.head_idx]) {
            self.head_idx += 1;
        }
        self.head_idx - start_idx
    }

    fn compact_if_needed(&mut self) {
        if self.head_idx > COMPACTION_THRESHOLD && self.head_idx * 2 > self.data.len() {
            self.data.drain(0..self.head_idx);
            self.head_idx = 0;
        }
    }

    #[inline]
    fn update_peak(&mut self) {
        let current = self.len();
        if current > self.peak {
            self.peak = current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::ContigOrder;
    use crate::feature::Payload;

    fn contigs() -> ContigOrder {
        ContigOrder::from_pairs([("chr1", 1_000_000), ("chr2", 500)]).unwrap()
    }

    fn feature(contigs: &ContigOrder, contig: &str, start: u64, stop: u64) -> Feature {
        Feature::new(contigs.location(contig, start, stop).unwrap(), Payload::Interval)
    }

    fn spans(window: &WindowBuffer<Payload>) -> Vec<(u64, u64)> {
        window.iter().map(|f| (f.start(), f.stop())).collect()
    }

    #[test]
    fn test_admit_and_overlap() {
        let c = contigs();
        let mut window = WindowBuffer::new("a", 1000);
        window.begin_fill();
        window.admit(feature(&c, "chr1", 10, 20)).unwrap();
        window.admit(feature(&c, "chr1", 15, 25)).unwrap();
        window.admit(feature(&c, "chr1", 30, 40)).unwrap();
        window.settle(false);
        assert_eq!(window.state(), WindowState::Ready);

        let cursor = c.locus("chr1", 18).unwrap();
        let hits: Vec<_> = window.peek_overlap(&cursor).map(|f| f.start()).collect();
        assert_eq!(hits, vec![10, 15]);
        // Queries do not consume
        assert_eq!(window.peek_overlap(&cursor).count(), 2);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_overlap_outlives_cursor() {
        let c = contigs();
        let mut window = WindowBuffer::new("a", 1000);
        window.admit(feature(&c, "chr1", 10, 20)).unwrap();
        window.admit(feature(&c, "chr1", 30, 40)).unwrap();

        let hits: Vec<&Feature> = {
            let cursor = c.locus("chr1", 35).unwrap();
            window.peek_overlap(&cursor).collect()
        };
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start(), 30);
    }

    #[test]
    fn test_window_overflow() {
        let c = contigs();
        let mut window = WindowBuffer::new("a", 100);
        window.admit(feature(&c, "chr1", 1, 100)).unwrap();
        match window.admit(feature(&c, "chr1", 50, 150)) {
            Err(RodError::WindowOverflow { span, limit, .. }) => {
                assert_eq!(span, 101);
                assert_eq!(limit, 100);
            }
            other => panic!("expected WindowOverflow, got {:?}", other),
        }
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_evict_sweeps_short_features_behind_long_ones() {
        let c = contigs();
        let mut window = WindowBuffer::new("a", 10_000);
        window.admit(feature(&c, "chr1", 1, 5)).unwrap();
        window.admit(feature(&c, "chr1", 2, 500)).unwrap();
        window.admit(feature(&c, "chr1", 3, 8)).unwrap();
        window.admit(feature(&c, "chr1", 100, 120)).unwrap();

        let removed = window.evict(&c.locus("chr1", 50).unwrap());
        assert_eq!(removed, 2);
        assert_eq!(spans(&window), vec![(2, 500), (100, 120)]);
    }

    #[test]
    fn test_evict_on_contig_change() {
        let c = contigs();
        let mut window = WindowBuffer::new("a", 10_000);
        window.admit(feature(&c, "chr1", 1, 5000)).unwrap();
        window.admit(feature(&c, "chr2", 1, 5)).unwrap();
        window.settle(false);

        assert_eq!(window.evict(&c.locus("chr2", 3).unwrap()), 1);
        assert_eq!(spans(&window), vec![(1, 5)]);
        assert_eq!(window.evict(&c.locus("chr2", 400).unwrap()), 1);
        assert!(window.is_empty());
        assert_eq!(window.state(), WindowState::Empty);
    }

    #[test]
    fn test_compaction_keeps_contents() {
        let c = contigs();
        let mut window = WindowBuffer::new("a", 10);
        for i in 0..10_000u64 {
            window.admit(feature(&c, "chr1", i * 10 + 1, i * 10 + 5)).unwrap();
        }
        let removed = window.evict(&c.locus("chr1", 60_001).unwrap());
        assert_eq!(removed, 6000);
        assert_eq!(window.len(), 4000);
        assert_eq!(window.iter().next().map(|f| f.start()), Some(60_001));
        assert_eq!(window.peak(), 10_000);
    }

    #[test]
    fn test_exhausted_is_terminal() {
        let c = contigs();
        let mut window: WindowBuffer<Payload> = WindowBuffer::new("a", 10);
        window.settle(true);
        window.begin_fill();
        assert_eq!(window.state(), WindowState::Exhausted);
        window.clear();
        assert_eq!(window.state(), WindowState::Exhausted);
        assert_eq!(window.evict(&c.locus("chr1", 1).unwrap()), 0);
    }
}
