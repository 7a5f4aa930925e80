//! Seekable source over a memory-mapped file and its block index.

use super::{FeatureSource, RecordDecoder, SourceStats};
use crate::codec::Decoder;
use crate::config::ErrorPolicy;
use crate::contig::ContigOrder;
use crate::error::{RecordPos, Result, RodError};
use crate::feature::{Feature, Payload};
use crate::index::FeatureIndex;
use crate::location::GenomeLocation;
use log::{debug, trace};
use memchr::memchr;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads records straight out of a memory map. Seeks jump to the block
/// chosen by the shared [`FeatureIndex`].
pub struct IndexedSource<P = Payload> {
    records: RecordDecoder<P>,
    path: PathBuf,
    index: Arc<FeatureIndex>,
    /// `None` for empty files and after `close`.
    mmap: Option<Mmap>,
    pos: usize,
    /// After a seek, features entirely before this location are dropped
    /// until the first one that is not.
    skip_before: Option<GenomeLocation>,
}

impl<P> IndexedSource<P> {
    /// Map `path` and check it against `index`.
    ///
    /// A data file whose size differs from the indexed size fails with
    /// `StaleIndex`.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        index: Arc<FeatureIndex>,
        decoder: Box<dyn Decoder<P> + Send>,
        contigs: Arc<ContigOrder>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RodError::io_at(path, e))?;
        let len = file.metadata().map_err(|e| RodError::io_at(path, e))?.len();
        index.check_data_len(len)?;

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: the map is read-only; track files are not modified
            // while a traversal runs (the size check above catches rewrites
            // that happen before it starts).
            Some(unsafe { Mmap::map(&file) }.map_err(|e| RodError::io_at(path, e))?)
        };

        let records = RecordDecoder::new(name.into(), decoder, contigs);
        debug!(
            "Opened track '{}' from {} ({} codec, indexed, {} blocks)",
            records.track(),
            path.display(),
            records.codec_name(),
            index.block_count()
        );

        Ok(Self {
            records,
            path: path.to_path_buf(),
            index,
            mmap,
            pos: 0,
            skip_before: None,
        })
    }

    /// Set the malformed-record policy (builder pattern).
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.records.set_policy(policy);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte position in the data file.
    pub fn position(&self) -> u64 {
        self.pos as u64
    }
}

impl<P> FeatureSource<P> for IndexedSource<P> {
    fn name(&self) -> &str {
        self.records.track()
    }

    fn kind(&self) -> &'static str {
        "indexed"
    }

    fn next_feature(&mut self) -> Result<Option<Feature<P>>> {
        loop {
            let Some(mmap) = self.mmap.as_ref() else {
                return Ok(None);
            };
            let data: &[u8] = mmap;
            if self.pos >= data.len() {
                return Ok(None);
            }

            let line_start = self.pos;
            let line_end = memchr(b'\n', &data[line_start..])
                .map(|i| line_start + i)
                .unwrap_or(data.len());
            self.pos = line_end + 1;

            let Some(feature) = self.records.decode_line(
                &data[line_start..line_end],
                RecordPos::Offset(line_start as u64),
            )?
            else {
                continue;
            };

            if let Some(target) = &self.skip_before {
                if feature.location().is_before(target) {
                    continue;
                }
                self.skip_before = None;
            }
            return Ok(Some(feature));
        }
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek_to(&mut self, target: &GenomeLocation) -> Result<()> {
        let offset = self
            .index
            .seek_offset(target)
            .unwrap_or(self.index.data_len());
        trace!(
            "Track '{}': seek to {} -> byte offset {}",
            self.records.track(),
            target,
            offset
        );
        self.pos = offset as usize;
        self.skip_before = Some(target.clone());
        self.records.reset_order();
        Ok(())
    }

    fn close(&mut self) {
        if self.mmap.take().is_some() {
            debug!("Closed track '{}'", self.records.track());
        }
        self.pos = 0;
    }

    fn set_silent(&mut self, silent: bool) {
        self.records.set_silent(silent);
    }

    fn stats(&self) -> SourceStats {
        self.records.stats()
    }
}
