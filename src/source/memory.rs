//! In-memory source, mainly for tests and for features produced by other
//! parts of a pipeline.

use super::{FeatureSource, OrderGuard, SourceStats};
use crate::error::{RecordPos, Result};
use crate::feature::{Feature, Payload};
use crate::location::GenomeLocation;
use std::collections::VecDeque;

/// Features held in a queue. Order is still checked as they are produced.
pub struct MemorySource<P = Payload> {
    name: String,
    features: VecDeque<Feature<P>>,
    guard: OrderGuard,
    produced: usize,
    closed: bool,
}

impl<P> MemorySource<P> {
    pub fn new(name: impl Into<String>, features: impl IntoIterator<Item = Feature<P>>) -> Self {
        Self {
            name: name.into(),
            features: features.into_iter().collect(),
            guard: OrderGuard::new(),
            produced: 0,
            closed: false,
        }
    }

    /// Features not yet produced.
    pub fn remaining(&self) -> usize {
        self.features.len()
    }
}

impl<P> FeatureSource<P> for MemorySource<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "memory"
    }

    fn next_feature(&mut self) -> Result<Option<Feature<P>>> {
        if self.closed {
            return Ok(None);
        }
        let Some(feature) = self.features.pop_front() else {
            return Ok(None);
        };
        self.guard.check(
            &self.name,
            feature.location(),
            RecordPos::Record(self.guard.record_count() + 1),
        )?;
        self.produced += 1;
        Ok(Some(feature))
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek_to(&mut self, target: &GenomeLocation) -> Result<()> {
        while self
            .features
            .front()
            .is_some_and(|f| f.location().is_before(target))
        {
            self.features.pop_front();
        }
        self.guard.reset();
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.features.clear();
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            records: self.produced,
            skipped: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::ContigOrder;
    use crate::error::RodError;

    fn features(contigs: &ContigOrder, spans: &[(&str, u64, u64)]) -> Vec<Feature> {
        spans
            .iter()
            .map(|&(c, s, e)| Feature::new(contigs.location(c, s, e).unwrap(), Payload::Interval))
            .collect()
    }

    #[test]
    fn test_seek_skips_features_before_target() {
        let contigs = ContigOrder::from_pairs([("chr1", 1000), ("chr2", 500)]).unwrap();
        let mut source = MemorySource::new(
            "m",
            features(
                &contigs,
                &[("chr1", 1, 5), ("chr1", 10, 50), ("chr1", 20, 25), ("chr2", 1, 3)],
            ),
        );
        assert!(source.can_seek());

        source.seek_to(&contigs.locus("chr1", 30).unwrap()).unwrap();
        let next = source.next_feature().unwrap().unwrap();
        assert_eq!((next.start(), next.stop()), (10, 50));
        assert_eq!(source.remaining(), 2);

        source.seek_to(&contigs.locus("chr2", 1).unwrap()).unwrap();
        let next = source.next_feature().unwrap().unwrap();
        assert_eq!(next.contig(), "chr2");
        assert!(source.next_feature().unwrap().is_none());
    }

    #[test]
    fn test_unsorted_reports_record_index() {
        let contigs = ContigOrder::from_pairs([("chr1", 1000)]).unwrap();
        let mut source = MemorySource::new(
            "m",
            features(&contigs, &[("chr1", 50, 60), ("chr1", 40, 45)]),
        );
        source.next_feature().unwrap();
        match source.next_feature() {
            Err(RodError::UnsortedInput { at, current, .. }) => {
                assert_eq!(at, RecordPos::Record(2));
                assert_eq!(current, "chr1:40-45");
            }
            other => panic!("expected UnsortedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let contigs = ContigOrder::from_pairs([("chr1", 1000)]).unwrap();
        let mut source = MemorySource::new("m", features(&contigs, &[("chr1", 1, 2)]));
        source.close();
        source.close();
        assert!(source.next_feature().unwrap().is_none());
        assert_eq!(source.stats().records, 0);
    }
}
