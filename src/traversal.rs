//! Traversal driver: feeds cursor steps to a [`TrackManager`] and folds the
//! per-step views through a [`Walker`].

use crate::config::{check_uncompressed, Codec};
use crate::contig::ContigOrder;
use crate::error::Result;
use crate::feature::Payload;
use crate::location::GenomeLocation;
use crate::manager::{RodView, TrackManager};
use crate::source::{FeatureSource, SequentialSource};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

/// One step of the primary traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalStep {
    /// A reference position or interval.
    Locus(GenomeLocation),
    /// One aligned read.
    Read {
        name: String,
        location: GenomeLocation,
    },
    /// Both mates of a pair.
    ReadPair {
        name: String,
        first: GenomeLocation,
        second: GenomeLocation,
    },
}

impl TraversalStep {
    /// Location the tracks are advanced to for this step.
    ///
    /// A pair on one contig covers both mates; a pair split across contigs
    /// uses the first mate.
    pub fn cursor(&self) -> GenomeLocation {
        match self {
            TraversalStep::Locus(location) => location.clone(),
            TraversalStep::Read { location, .. } => location.clone(),
            TraversalStep::ReadPair { first, second, .. } => first
                .endpoint_span(second)
                .unwrap_or_else(|_| first.clone()),
        }
    }

    /// Read name for read steps.
    pub fn label(&self) -> Option<&str> {
        match self {
            TraversalStep::Locus(_) => None,
            TraversalStep::Read { name, .. } | TraversalStep::ReadPair { name, .. } => Some(name),
        }
    }
}

/// Map/reduce consumer of traversal steps.
pub trait Walker<P = Payload> {
    /// Result of visiting one cursor.
    type Value;
    /// Running reduction.
    type Sum;

    fn reduce_init(&mut self) -> Self::Sum;

    fn map(
        &mut self,
        step: &TraversalStep,
        cursor: &GenomeLocation,
        view: &RodView<'_, P>,
    ) -> Result<Self::Value>;

    fn reduce(&mut self, value: Self::Value, sum: Self::Sum) -> Self::Sum;

    /// Called once after the last step.
    fn on_traversal_done(&mut self, sum: Self::Sum) -> Result<Self::Sum> {
        Ok(sum)
    }
}

/// Traversal settings.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// Visit every base of an interval step separately.
    by_locus: bool,
    /// Reposition the tracks instead of streaming when the next cursor is
    /// more than this many bases past the previous one (or on another
    /// contig).
    seek_gap: Option<u64>,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand interval steps into single-base steps (builder pattern).
    pub fn with_by_locus(mut self, by_locus: bool) -> Self {
        self.by_locus = by_locus;
        self
    }

    /// Seek tracks across gaps wider than `gap` bases (builder pattern).
    pub fn with_seek_gap(mut self, gap: Option<u64>) -> Self {
        self.seek_gap = gap;
        self
    }

    /// Drive `steps` through `manager` and `walker`.
    ///
    /// The manager is closed when this returns, whether or not the
    /// traversal succeeded.
    pub fn run<P, W, I>(&self, manager: &mut TrackManager<P>, steps: I, walker: &mut W) -> Result<W::Sum>
    where
        W: Walker<P>,
        I: IntoIterator<Item = TraversalStep>,
    {
        let result = self.drive(manager, steps, walker);
        manager.close();
        result
    }

    fn drive<P, W, I>(&self, manager: &mut TrackManager<P>, steps: I, walker: &mut W) -> Result<W::Sum>
    where
        W: Walker<P>,
        I: IntoIterator<Item = TraversalStep>,
    {
        let mut sum = walker.reduce_init();
        let mut previous: Option<GenomeLocation> = None;

        for step in steps {
            let cursor = step.cursor();
            if self.by_locus && matches!(step, TraversalStep::Locus(_)) {
                for pos in cursor.start()..=cursor.stop() {
                    let locus = cursor.with_bounds(pos, pos);
                    sum = self.visit(manager, &step, &locus, walker, sum, &mut previous)?;
                }
            } else {
                sum = self.visit(manager, &step, &cursor, walker, sum, &mut previous)?;
            }
        }

        manager.finish_scope()?;
        debug!("Traversal finished after {} steps", manager.steps());
        walker.on_traversal_done(sum)
    }

    fn visit<P, W>(
        &self,
        manager: &mut TrackManager<P>,
        step: &TraversalStep,
        cursor: &GenomeLocation,
        walker: &mut W,
        sum: W::Sum,
        previous: &mut Option<GenomeLocation>,
    ) -> Result<W::Sum>
    where
        W: Walker<P>,
    {
        if let Some(gap) = self.seek_gap {
            let far = previous.as_ref().is_none_or(|prev| {
                !prev.on_same_contig(cursor) || cursor.start() > prev.stop().saturating_add(gap)
            });
            if far {
                manager.seek_all(cursor)?;
            }
        }

        let value = manager.step(cursor, |view| walker.map(step, cursor, view))??;
        *previous = Some(cursor.clone());
        Ok(walker.reduce(value, sum))
    }
}

/// Read a cursor list (locus list or BED file) as `Locus` steps.
///
/// The list must be sorted; disorder fails with `UnsortedInput` naming the
/// "loci" track.
pub fn read_loci(path: impl AsRef<Path>, codec: Codec, contigs: Arc<ContigOrder>) -> Result<Vec<TraversalStep>> {
    let path = path.as_ref();
    check_uncompressed(path)?;
    let mut source = SequentialSource::open(
        "loci",
        path,
        codec.decoder(),
        contigs,
        crate::config::DEFAULT_INPUT_BUFFER,
    )?;

    let mut steps = Vec::new();
    while let Some(feature) = source.next_feature()? {
        let (location, _) = feature.into_parts();
        steps.push(TraversalStep::Locus(location));
    }
    source.close();

    info!("Read {} cursor intervals from {}", steps.len(), path.display());
    Ok(steps)
}
