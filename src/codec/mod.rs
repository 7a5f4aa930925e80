//! Decoders that turn text records into typed features.
//!
//! A codec only has to satisfy the [`Decoder`] contract; ordering checks,
//! skip policies and positions for diagnostics are handled by the sources
//! that drive it.

pub mod bed;
pub mod loci;

pub use bed::BedDecoder;
pub use loci::LocusDecoder;

use crate::contig::ContigOrder;
use crate::error::{Result, RodError};
use crate::feature::Feature;

/// Line-oriented record decoder.
pub trait Decoder<P> {
    /// Short codec name for logs and error messages.
    fn codec_name(&self) -> &'static str;

    /// Decode one line (without its newline).
    ///
    /// Returns `Ok(None)` for headers, comments and blank lines.
    fn decode(&mut self, line: &[u8], contigs: &ContigOrder) -> Result<Option<Feature<P>>>;
}

impl<P, D: Decoder<P> + ?Sized> Decoder<P> for Box<D> {
    fn codec_name(&self) -> &'static str {
        (**self).codec_name()
    }

    fn decode(&mut self, line: &[u8], contigs: &ContigOrder) -> Result<Option<Feature<P>>> {
        (**self).decode(line, contigs)
    }
}

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty or contains non-digit characters.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Check if a line should be skipped (empty, comment, or header).
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.is_empty() || line[0] == b'#' || line.starts_with(b"track") || line.starts_with(b"browser")
}

/// Strip a trailing `\n` / `\r\n`.
#[inline]
pub fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// Parse a coordinate column, naming the field on failure.
pub(crate) fn parse_coordinate(line: &[u8], field: &'static str, bytes: &[u8]) -> Result<u64> {
    parse_u64_fast(bytes).ok_or_else(|| RodError::MalformedLocation {
        text: String::from_utf8_lossy(line).into_owned(),
        field,
        message: format!("'{}' is not a number", String::from_utf8_lossy(bytes)),
    })
}

/// Decode a contig column as UTF-8.
pub(crate) fn contig_field<'a>(line: &[u8], bytes: &'a [u8]) -> Result<&'a str> {
    if bytes.is_empty() {
        return Err(RodError::MalformedLocation {
            text: String::from_utf8_lossy(line).into_owned(),
            field: "chrom",
            message: "empty contig name".to_string(),
        });
    }
    std::str::from_utf8(bytes).map_err(|_| RodError::MalformedLocation {
        text: String::from_utf8_lossy(line).into_owned(),
        field: "chrom",
        message: "contig name is not valid UTF-8".to_string(),
    })
}
