//! Block index for seekable access to sorted track files.
//!
//! For every contig the index keeps one block per `stride` records. A
//! block stores the first record's start, the running maximum stop of the
//! contig up to the end of the block, and the byte offset of the block's
//! first line. Because `max_stop` never decreases within a contig, a binary
//! search finds the first block that can hold a feature reaching a target.
//!
//! On disk the index is a small text file:
//!
//! ```text
//! #rodwalk-index  v1  data_len=1048576  stride=64
//! chr1    10      2000    0
//! chr1    1500    9000    2411
//! chr2    1       300     5120
//! ```

use crate::codec::Decoder;
use crate::config::check_uncompressed;
use crate::contig::ContigOrder;
use crate::error::{RecordPos, Result, RodError};
use crate::location::GenomeLocation;
use crate::source::RecordDecoder;
use log::{debug, info};
use memchr::memchr;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of records per block.
pub const DEFAULT_STRIDE: usize = 64;

/// File extension appended to the data path for the default index path.
pub const INDEX_EXTENSION: &str = "ridx";

const MAGIC: &str = "#rodwalk-index";
const FORMAT_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBlock {
    pub first_start: u64,
    /// Running maximum stop over the contig up to the end of this block.
    pub max_stop: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContigBlocks {
    name: Arc<str>,
    rank: u32,
    blocks: Vec<IndexBlock>,
}

/// Per-contig block index over one data file. Immutable once built and
/// shared between sources through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureIndex {
    origin: PathBuf,
    data_len: u64,
    stride: usize,
    contigs: Vec<ContigBlocks>,
}

impl FeatureIndex {
    /// Index a data file by decoding every record.
    ///
    /// The file must be sorted; disorder fails with `UnsortedInput` and
    /// malformed records abort the build.
    pub fn build<P>(
        path: impl AsRef<Path>,
        decoder: Box<dyn Decoder<P> + Send>,
        contigs: Arc<ContigOrder>,
        stride: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        check_uncompressed(path)?;
        let file = File::open(path).map_err(|e| RodError::io_at(path, e))?;
        let len = file.metadata().map_err(|e| RodError::io_at(path, e))?.len();

        let track = path.display().to_string();
        let mut records = RecordDecoder::new(track, decoder, contigs);

        let index = if len == 0 {
            Self::build_from_bytes(path, &[], &mut records, stride)?
        } else {
            // SAFETY: the map is read-only and dropped before returning.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| RodError::io_at(path, e))?;
            Self::build_from_bytes(path, &mmap, &mut records, stride)?
        };

        info!(
            "Indexed {}: {} records in {} blocks across {} contigs",
            path.display(),
            records.stats().records,
            index.block_count(),
            index.contigs.len()
        );
        Ok(index)
    }

    fn build_from_bytes<P>(
        origin: &Path,
        data: &[u8],
        records: &mut RecordDecoder<P>,
        stride: usize,
    ) -> Result<Self> {
        let stride = stride.max(1);
        let mut contigs: Vec<ContigBlocks> = Vec::new();
        let mut in_block = 0usize;
        let mut pos = 0usize;

        while pos < data.len() {
            let line_start = pos;
            let line_end = memchr(b'\n', &data[pos..])
                .map(|i| pos + i)
                .unwrap_or(data.len());
            pos = line_end + 1;

            let Some(feature) = records
                .decode_line(&data[line_start..line_end], RecordPos::Offset(line_start as u64))?
            else {
                continue;
            };
            let loc = feature.location();

            let same_contig = contigs.last().is_some_and(|c| c.rank == loc.rank());
            if !same_contig {
                contigs.push(ContigBlocks {
                    name: loc.contig_arc().clone(),
                    rank: loc.rank(),
                    blocks: Vec::new(),
                });
                in_block = 0;
            }
            let Some(entry) = contigs.last_mut() else {
                continue;
            };

            let running_max = entry
                .blocks
                .last()
                .map_or(loc.stop(), |b| b.max_stop.max(loc.stop()));

            if in_block == 0 {
                entry.blocks.push(IndexBlock {
                    first_start: loc.start(),
                    max_stop: running_max,
                    offset: line_start as u64,
                });
            } else if let Some(block) = entry.blocks.last_mut() {
                block.max_stop = running_max;
            }
            in_block = (in_block + 1) % stride;
        }

        Ok(Self {
            origin: origin.to_path_buf(),
            data_len: data.len() as u64,
            stride,
            contigs,
        })
    }

    /// Byte offset from which reading finds every feature that is not
    /// entirely before `target`. `None` means no such feature exists.
    pub fn seek_offset(&self, target: &GenomeLocation) -> Option<u64> {
        let i = self.contigs.partition_point(|c| c.rank < target.rank());
        let entry = self.contigs.get(i)?;

        if entry.rank == target.rank() {
            let j = entry
                .blocks
                .partition_point(|b| b.max_stop < target.start());
            if let Some(block) = entry.blocks.get(j) {
                return Some(block.offset);
            }
            return self
                .contigs
                .get(i + 1)
                .and_then(|c| c.blocks.first())
                .map(|b| b.offset);
        }

        entry.blocks.first().map(|b| b.offset)
    }

    /// Fail with `StaleIndex` if the data file changed size since indexing.
    pub fn check_data_len(&self, actual: u64) -> Result<()> {
        if actual != self.data_len {
            return Err(RodError::StaleIndex {
                index: self.origin.clone(),
                reason: format!(
                    "indexed {} bytes but the data file has {} bytes",
                    self.data_len, actual
                ),
            });
        }
        Ok(())
    }

    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn block_count(&self) -> usize {
        self.contigs.iter().map(|c| c.blocks.len()).sum()
    }

    /// Blocks of one contig, in file order.
    pub fn blocks(&self, contig: &str) -> &[IndexBlock] {
        self.contigs
            .iter()
            .find(|c| c.name.as_ref() == contig)
            .map_or(&[], |c| c.blocks.as_slice())
    }

    /// `data.bed` -> `data.bed.ridx`.
    pub fn default_path(data: &Path) -> PathBuf {
        let mut name = data.as_os_str().to_owned();
        name.push(".");
        name.push(INDEX_EXTENSION);
        PathBuf::from(name)
    }

    /// Write the index as text.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| RodError::io_at(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| RodError::io_at(path, e))?;
        debug!("Wrote index {} ({} blocks)", path.display(), self.block_count());
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(
            writer,
            "{}\t{}\tdata_len={}\tstride={}",
            MAGIC, FORMAT_VERSION, self.data_len, self.stride
        )?;
        for entry in &self.contigs {
            for block in &entry.blocks {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}",
                    entry.name, block.first_start, block.max_stop, block.offset
                )?;
            }
        }
        Ok(())
    }

    /// Read an index written by [`write`](Self::write), resolving contig
    /// names against `contigs`.
    pub fn read(path: impl AsRef<Path>, contigs: &ContigOrder) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RodError::io_at(path, e))?;
        Self::from_reader(path, BufReader::new(file), contigs)
    }

    pub fn from_reader<R: BufRead>(origin: &Path, reader: R, contigs: &ContigOrder) -> Result<Self> {
        let stale = |reason: String| RodError::StaleIndex {
            index: origin.to_path_buf(),
            reason,
        };

        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line.map_err(|e| RodError::io_at(origin, e))?,
            None => return Err(stale("empty index file".to_string())),
        };
        let (data_len, stride) = parse_header(&header).ok_or_else(|| {
            stale(format!("unrecognized header '{}'", header))
        })?;

        let mut index = Self {
            origin: origin.to_path_buf(),
            data_len,
            stride,
            contigs: Vec::new(),
        };

        for (i, line) in lines.enumerate() {
            let line = line.map_err(|e| RodError::io_at(origin, e))?;
            if line.is_empty() {
                continue;
            }
            let line_num = i + 2;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 4 {
                return Err(stale(format!("line {}: expected 4 columns", line_num)));
            }
            let rank = contigs
                .rank(fields[0])
                .map_err(|e| stale(format!("line {}: {}", line_num, e)))?;
            let number = |s: &str| {
                s.parse::<u64>()
                    .map_err(|_| stale(format!("line {}: '{}' is not a number", line_num, s)))
            };
            let block = IndexBlock {
                first_start: number(fields[1])?,
                max_stop: number(fields[2])?,
                offset: number(fields[3])?,
            };
            if block.offset >= data_len {
                return Err(stale(format!(
                    "line {}: offset {} is past the end of the data",
                    line_num, block.offset
                )));
            }

            match index.contigs.last_mut() {
                Some(entry) if entry.rank == rank => {
                    if let Some(prev) = entry.blocks.last() {
                        if block.offset <= prev.offset
                            || block.first_start < prev.first_start
                            || block.max_stop < prev.max_stop
                        {
                            return Err(stale(format!("line {}: blocks out of order", line_num)));
                        }
                    }
                    entry.blocks.push(block);
                }
                last => {
                    if last.is_some_and(|e| e.rank > rank) {
                        return Err(stale(format!(
                            "line {}: contig '{}' out of dictionary order",
                            line_num, fields[0]
                        )));
                    }
                    let name = contigs
                        .name(rank)
                        .cloned()
                        .unwrap_or_else(|| Arc::from(fields[0]));
                    index.contigs.push(ContigBlocks {
                        name,
                        rank,
                        blocks: vec![block],
                    });
                }
            }
        }

        Ok(index)
    }
}

fn parse_header(header: &str) -> Option<(u64, usize)> {
    let mut fields = header.split('\t');
    if fields.next()? != MAGIC || fields.next()? != FORMAT_VERSION {
        return None;
    }
    let data_len = fields.next()?.strip_prefix("data_len=")?.parse().ok()?;
    let stride = fields.next()?.strip_prefix("stride=")?.parse().ok()?;
    Some((data_len, stride))
}
