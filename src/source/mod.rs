//! Feature sources: sorted streams of decoded features from one input.
//!
//! Three variants are provided:
//! - [`SequentialSource`]: any buffered reader, forward-only.
//! - [`IndexedSource`]: memory-mapped file plus a [`FeatureIndex`](crate::index::FeatureIndex),
//!   seekable.
//! - [`MemorySource`]: features already in memory, seekable.

pub mod indexed;
pub mod memory;
pub mod order;
pub mod sequential;

pub use indexed::IndexedSource;
pub use memory::MemorySource;
pub use order::OrderGuard;
pub use sequential::SequentialSource;

use crate::codec::Decoder;
use crate::config::ErrorPolicy;
use crate::contig::ContigOrder;
use crate::error::{RecordPos, Result, RodError};
use crate::feature::{Feature, Payload};
use crate::location::GenomeLocation;
use log::{debug, warn};
use std::sync::Arc;

/// Counters kept by every source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    /// Features produced.
    pub records: usize,
    /// Malformed records skipped under [`ErrorPolicy::SkipRecord`].
    pub skipped: usize,
}

/// A sorted stream of `(location, payload)` features.
pub trait FeatureSource<P = Payload> {
    /// Track name, used in every diagnostic.
    fn name(&self) -> &str;

    /// Short variant name ("sequential", "indexed", "memory").
    fn kind(&self) -> &'static str;

    /// Next feature in non-decreasing (rank, start, stop) order.
    ///
    /// An out-of-order feature fails with `UnsortedInput`.
    fn next_feature(&mut self) -> Result<Option<Feature<P>>>;

    /// Whether [`seek_to`](Self::seek_to) is supported.
    fn can_seek(&self) -> bool {
        false
    }

    /// Reposition to the first feature that is not entirely before
    /// `target`, discarding any read-ahead.
    fn seek_to(&mut self, target: &GenomeLocation) -> Result<()> {
        let _ = target;
        Err(RodError::UnsupportedSeek {
            track: self.name().to_string(),
            kind: self.kind(),
        })
    }

    /// Release the underlying handle. Calling it twice is harmless.
    fn close(&mut self);

    /// While silent, skipped records are neither logged as warnings nor
    /// counted. Used for input that another shard accounts for.
    fn set_silent(&mut self, silent: bool) {
        let _ = silent;
    }

    fn stats(&self) -> SourceStats {
        SourceStats::default()
    }
}

/// Decoding pipeline shared by the file-backed sources: decode, check
/// order, apply the skip policy.
pub(crate) struct RecordDecoder<P> {
    track: String,
    decoder: Box<dyn Decoder<P> + Send>,
    contigs: Arc<ContigOrder>,
    guard: OrderGuard,
    policy: ErrorPolicy,
    silent: bool,
    stats: SourceStats,
}

impl<P> RecordDecoder<P> {
    pub(crate) fn new(
        track: String,
        decoder: Box<dyn Decoder<P> + Send>,
        contigs: Arc<ContigOrder>,
    ) -> Self {
        Self {
            track,
            decoder,
            contigs,
            guard: OrderGuard::new(),
            policy: ErrorPolicy::Abort,
            silent: false,
            stats: SourceStats::default(),
        }
    }

    pub(crate) fn set_policy(&mut self, policy: ErrorPolicy) {
        self.policy = policy;
    }

    pub(crate) fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub(crate) fn track(&self) -> &str {
        &self.track
    }

    pub(crate) fn codec_name(&self) -> &'static str {
        self.decoder.codec_name()
    }

    pub(crate) fn stats(&self) -> SourceStats {
        self.stats
    }

    pub(crate) fn reset_order(&mut self) {
        self.guard.reset();
    }

    /// Decode one raw line.
    ///
    /// `Ok(None)` means the line produced no feature (header, comment or a
    /// skipped record) and the caller should read on.
    pub(crate) fn decode_line(&mut self, line: &[u8], at: RecordPos) -> Result<Option<Feature<P>>> {
        match self.decoder.decode(line, &self.contigs) {
            Ok(Some(feature)) => {
                self.guard.check(&self.track, feature.location(), at)?;
                self.stats.records += 1;
                Ok(Some(feature))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_record_error() => {
                let err = RodError::MalformedFeature {
                    track: self.track.clone(),
                    at,
                    raw: String::from_utf8_lossy(crate::codec::trim_line_end(line)).into_owned(),
                    message: e.to_string(),
                };
                if self.policy == ErrorPolicy::SkipRecord {
                    if self.silent {
                        debug!("Passing over record: {}", err);
                    } else {
                        warn!("Skipping record: {}", err);
                        self.stats.skipped += 1;
                    }
                    Ok(None)
                } else {
                    Err(err)
                }
            }
            Err(RodError::InvalidLocation(message)) => Err(RodError::InvalidLocation(format!(
                "track '{}' at {}: {}",
                self.track, at, message
            ))),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BedDecoder;

    fn records(policy: ErrorPolicy) -> RecordDecoder<Payload> {
        let contigs = Arc::new(ContigOrder::from_pairs([("chr1", 1000)]).unwrap());
        let mut records = RecordDecoder::new("a".to_string(), Box::new(BedDecoder::new()), contigs);
        records.set_policy(policy);
        records
    }

    #[test]
    fn test_malformed_record_carries_context() {
        let mut records = records(ErrorPolicy::Abort);
        match records.decode_line(b"chr1\tx\t10\n", RecordPos::Line(7)) {
            Err(RodError::MalformedFeature { track, at, raw, .. }) => {
                assert_eq!(track, "a");
                assert_eq!(at, RecordPos::Line(7));
                assert_eq!(raw, "chr1\tx\t10");
            }
            other => panic!("expected MalformedFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_policy_counts_records() {
        let mut records = records(ErrorPolicy::SkipRecord);
        assert!(records
            .decode_line(b"chr1\t5\t5", RecordPos::Line(1))
            .unwrap()
            .is_none());
        assert!(records
            .decode_line(b"chr1\t5\t6", RecordPos::Line(2))
            .unwrap()
            .is_some());
        assert_eq!(records.stats(), SourceStats { records: 1, skipped: 1 });
    }

    #[test]
    fn test_silent_skips_are_not_counted() {
        let mut records = records(ErrorPolicy::SkipRecord);
        records.set_silent(true);
        assert!(records
            .decode_line(b"chr1\tx\t10", RecordPos::Line(1))
            .unwrap()
            .is_none());
        records.set_silent(false);
        assert!(records
            .decode_line(b"chr1\ty\t10", RecordPos::Line(2))
            .unwrap()
            .is_none());
        assert_eq!(records.stats(), SourceStats { records: 0, skipped: 1 });
    }

    #[test]
    fn test_unknown_contig_is_not_skipped() {
        let mut records = records(ErrorPolicy::SkipRecord);
        let err = records
            .decode_line(b"chrZ\t5\t6", RecordPos::Line(3))
            .unwrap_err();
        assert!(matches!(err, RodError::InvalidLocation(ref m) if m.contains("line 3")));
    }

    #[test]
    fn test_disorder_is_never_skipped() {
        let mut records = records(ErrorPolicy::SkipRecord);
        records.decode_line(b"chr1\t49\t60", RecordPos::Line(1)).unwrap();
        let err = records
            .decode_line(b"chr1\t39\t45", RecordPos::Line(2))
            .unwrap_err();
        assert!(matches!(err, RodError::UnsortedInput { record: 2, .. }));
    }
}
