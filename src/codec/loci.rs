//! Locus-list decoder.
//!
//! Accepts one location per line, either as a location string
//! (`chr1:100-200`, `chr1:1,000`, `chr1`) or as a tab-separated 1-based
//! closed `chrom start stop [...]` triple (interval-list bodies). Lines
//! starting with `@` or `#` are headers.

use super::{contig_field, parse_coordinate, trim_line_end, Decoder};
use crate::contig::ContigOrder;
use crate::error::{Result, RodError};
use crate::feature::{Feature, Payload};
use memchr::memchr;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocusDecoder;

impl LocusDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder<Payload> for LocusDecoder {
    fn codec_name(&self) -> &'static str {
        "loci"
    }

    fn decode(&mut self, line: &[u8], contigs: &ContigOrder) -> Result<Option<Feature<Payload>>> {
        let line = trim_line_end(line);
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() || trimmed[0] == b'@' || trimmed[0] == b'#' {
            return Ok(None);
        }

        let location = if memchr(b'\t', trimmed).is_some() {
            let mut fields = trimmed.split(|&b| b == b'\t');
            let chrom = contig_field(line, fields.next().unwrap_or_default())?;
            let start = parse_coordinate(line, "start", fields.next().unwrap_or_default())?;
            let stop = parse_coordinate(line, "stop", fields.next().unwrap_or_default())?;
            contigs.bounded_location(chrom, start, stop)?
        } else {
            let text = std::str::from_utf8(trimmed).map_err(|_| RodError::MalformedLocation {
                text: String::from_utf8_lossy(trimmed).into_owned(),
                field: "chrom",
                message: "location is not valid UTF-8".to_string(),
            })?;
            contigs.parse_location(text)?
        };

        Ok(Some(Feature::new(location, Payload::Interval)))
    }
}
