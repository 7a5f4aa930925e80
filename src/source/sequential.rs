//! Forward-only source over any buffered reader.

use super::{FeatureSource, RecordDecoder, SourceStats};
use crate::codec::Decoder;
use crate::config::ErrorPolicy;
use crate::contig::ContigOrder;
use crate::error::{RecordPos, Result, RodError};
use crate::feature::{Feature, Payload};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Streams features line by line. Seeking is not supported.
pub struct SequentialSource<P = Payload, R = BufReader<File>> {
    records: RecordDecoder<P>,
    reader: Option<R>,
    path: Option<PathBuf>,
    line_buf: Vec<u8>,
    line_num: usize,
}

impl<P> SequentialSource<P, BufReader<File>> {
    /// Open a file with the given read buffer size.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        decoder: Box<dyn Decoder<P> + Send>,
        contigs: Arc<ContigOrder>,
        buffer_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RodError::io_at(path, e))?;
        let mut source = Self::from_reader(
            name,
            BufReader::with_capacity(buffer_size, file),
            decoder,
            contigs,
        );
        debug!(
            "Opened track '{}' from {} ({} codec, sequential)",
            source.name(),
            path.display(),
            source.records_codec()
        );
        source.path = Some(path.to_path_buf());
        Ok(source)
    }
}

impl<P, R: BufRead> SequentialSource<P, R> {
    pub fn from_reader(
        name: impl Into<String>,
        reader: R,
        decoder: Box<dyn Decoder<P> + Send>,
        contigs: Arc<ContigOrder>,
    ) -> Self {
        Self {
            records: RecordDecoder::new(name.into(), decoder, contigs),
            reader: Some(reader),
            path: None,
            line_buf: Vec::with_capacity(1024),
            line_num: 0,
        }
    }

    /// Set the malformed-record policy (builder pattern).
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.records.set_policy(policy);
        self
    }

    fn records_codec(&self) -> &'static str {
        self.records.codec_name()
    }

    fn read_error(&self, e: std::io::Error) -> RodError {
        match &self.path {
            Some(path) => RodError::io_at(path, e),
            None => RodError::Io(e),
        }
    }
}

impl<P, R: BufRead> FeatureSource<P> for SequentialSource<P, R> {
    fn name(&self) -> &str {
        self.records.track()
    }

    fn kind(&self) -> &'static str {
        "sequential"
    }

    fn next_feature(&mut self) -> Result<Option<Feature<P>>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            self.line_buf.clear();
            let n = match reader.read_until(b'\n', &mut self.line_buf) {
                Ok(n) => n,
                Err(e) => return Err(self.read_error(e)),
            };
            if n == 0 {
                debug!(
                    "Track '{}' exhausted after {} lines",
                    self.records.track(),
                    self.line_num
                );
                self.reader = None;
                return Ok(None);
            }
            self.line_num += 1;

            if let Some(feature) = self
                .records
                .decode_line(&self.line_buf, RecordPos::Line(self.line_num))?
            {
                return Ok(Some(feature));
            }
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed track '{}'", self.records.track());
        }
    }

    fn set_silent(&mut self, silent: bool) {
        self.records.set_silent(silent);
    }

    fn stats(&self) -> SourceStats {
        self.records.stats()
    }
}
