//! Walker that prints per-step overlaps as tab-delimited text.
//!
//! One line per (step, feature):
//!
//! ```text
//! cursor  step  track  chrom  start0  end  name  score  strand
//! ```
//!
//! `step` is the read name for read steps and `.` otherwise. Feature
//! coordinates are written back in 0-based, half-open form.

use crate::error::Result;
use crate::feature::Payload;
use crate::location::GenomeLocation;
use crate::manager::RodView;
use crate::output::RecordWriter;
use crate::traversal::{TraversalStep, Walker};
use std::io::Write;

/// Totals reduced over a traversal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportTotals {
    pub steps: usize,
    /// Steps where at least one track had a feature.
    pub steps_with_hits: usize,
    pub features: usize,
}

impl ReportTotals {
    pub fn merge(&mut self, other: &ReportTotals) {
        self.steps += other.steps;
        self.steps_with_hits += other.steps_with_hits;
        self.features += other.features;
    }
}

impl std::fmt::Display for ReportTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Steps: {}, With overlaps: {}, Features reported: {}",
            self.steps, self.steps_with_hits, self.features
        )
    }
}

/// Overlap printer.
pub struct OverlapReporter<W: Write> {
    writer: RecordWriter<W>,
    report_empty: bool,
}

impl<W: Write> OverlapReporter<W> {
    pub fn new(writer: RecordWriter<W>) -> Self {
        Self {
            writer,
            report_empty: false,
        }
    }

    /// Also print steps with no overlapping features (builder pattern).
    pub fn with_report_empty(mut self, report_empty: bool) -> Self {
        self.report_empty = report_empty;
        self
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner()
    }

    fn write_prefix(&mut self, step: &TraversalStep, cursor: &GenomeLocation) -> Result<()> {
        self.writer.write_location(cursor)?;
        self.writer.write_tab()?;
        self.writer
            .write_bytes(step.label().unwrap_or(".").as_bytes())?;
        Ok(())
    }
}

impl<W: Write> Walker<Payload> for OverlapReporter<W> {
    type Value = usize;
    type Sum = ReportTotals;

    fn reduce_init(&mut self) -> Self::Sum {
        ReportTotals::default()
    }

    fn map(
        &mut self,
        step: &TraversalStep,
        cursor: &GenomeLocation,
        view: &RodView<'_, Payload>,
    ) -> Result<Self::Value> {
        let mut reported = 0;
        for (track, feature) in view.all_values() {
            self.write_prefix(step, cursor)?;
            self.writer.write_tab()?;
            self.writer.write_bytes(track.as_bytes())?;
            self.writer.write_tab()?;
            self.writer.write_feature_bed(feature)?;
            self.writer.write_newline()?;
            reported += 1;
        }

        if reported == 0 && self.report_empty {
            self.write_prefix(step, cursor)?;
            self.writer.write_bytes(b"\t.\t.\t.\t.\t.\t.\t.")?;
            self.writer.write_newline()?;
        }
        Ok(reported)
    }

    fn reduce(&mut self, value: Self::Value, mut sum: Self::Sum) -> Self::Sum {
        sum.steps += 1;
        sum.features += value;
        if value > 0 {
            sum.steps_with_hits += 1;
        }
        sum
    }

    fn on_traversal_done(&mut self, sum: Self::Sum) -> Result<Self::Sum> {
        self.writer.flush()?;
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::ContigOrder;
    use crate::feature::{BedFields, Feature};
    use crate::manager::TrackManager;
    use crate::source::MemorySource;
    use crate::track::RodTrack;
    use crate::traversal::Traversal;

    #[test]
    fn test_report_lines() {
        let c = ContigOrder::from_pairs([("chr1", 1000)]).unwrap();
        let features = vec![
            Feature::new(
                c.location("chr1", 10, 20).unwrap(),
                Payload::Bed(BedFields {
                    name: Some("a1".to_string()),
                    ..Default::default()
                }),
            ),
            Feature::new(c.location("chr1", 15, 25).unwrap(), Payload::Interval),
        ];
        let mut manager = TrackManager::new();
        manager
            .add_track(RodTrack::new(Box::new(MemorySource::new("a", features)), 1000))
            .unwrap();

        let steps = vec![
            TraversalStep::Locus(c.locus("chr1", 12).unwrap()),
            TraversalStep::Read {
                name: "read7".to_string(),
                location: c.location("chr1", 16, 30).unwrap(),
            },
            TraversalStep::Locus(c.locus("chr1", 500).unwrap()),
        ];

        let mut reporter =
            OverlapReporter::new(RecordWriter::new(Vec::new())).with_report_empty(true);
        let totals = Traversal::new()
            .run(&mut manager, steps, &mut reporter)
            .unwrap();
        assert_eq!(
            totals,
            ReportTotals {
                steps: 3,
                steps_with_hits: 2,
                features: 3
            }
        );

        let out = String::from_utf8(reporter.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "chr1:12\t.\ta\tchr1\t9\t20\ta1\t.\t.",
                "chr1:16-30\tread7\ta\tchr1\t9\t20\ta1\t.\t.",
                "chr1:16-30\tread7\ta\tchr1\t14\t25\t.\t.\t.",
                "chr1:500\t.\t.\t.\t.\t.\t.\t.\t.",
            ]
        );
    }
}
