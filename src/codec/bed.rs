//! BED decoder.
//!
//! BED uses 0-based, half-open coordinates; every record is converted to the
//! closed 1-based form with `start = start0 + 1`, `stop = end0`. Zero-length
//! records (`start0 == end0`) have no closed representation and are
//! reported as malformed.

use super::{contig_field, parse_coordinate, should_skip_line, trim_line_end, Decoder};
use crate::contig::ContigOrder;
use crate::error::{Result, RodError};
use crate::feature::{BedFields, Feature, Payload, Strand};
use memchr::memchr;

/// Decoder for BED3 through BED12+ lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct BedDecoder {
    /// Keep only coordinates and drop columns 4+.
    coordinates_only: bool,
}

impl BedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip parsing of the optional columns (builder pattern).
    pub fn with_coordinates_only(mut self, coordinates_only: bool) -> Self {
        self.coordinates_only = coordinates_only;
        self
    }
}

/// Split the three coordinate columns using memchr - zero allocation.
///
/// Returns `(chrom, start, end, rest)` where `rest` is everything after the
/// end column (without its leading tab), or `None` if fewer than three
/// columns are present.
#[inline(always)]
pub fn split_bed3(line: &[u8]) -> Option<(&[u8], &[u8], &[u8], &[u8])> {
    let tab1 = memchr(b'\t', line)?;
    let chrom = &line[..tab1];

    let rest1 = &line[tab1 + 1..];
    let tab2 = memchr(b'\t', rest1)?;
    let start = &rest1[..tab2];

    let rest2 = &rest1[tab2 + 1..];
    match memchr(b'\t', rest2) {
        Some(tab3) => Some((chrom, start, &rest2[..tab3], &rest2[tab3 + 1..])),
        None => Some((chrom, start, rest2, &[])),
    }
}

impl Decoder<Payload> for BedDecoder {
    fn codec_name(&self) -> &'static str {
        "bed"
    }

    fn decode(&mut self, line: &[u8], contigs: &ContigOrder) -> Result<Option<Feature<Payload>>> {
        let line = trim_line_end(line);
        if should_skip_line(line) {
            return Ok(None);
        }

        let (chrom, start, end, rest) =
            split_bed3(line).ok_or_else(|| RodError::MalformedLocation {
                text: String::from_utf8_lossy(line).into_owned(),
                field: "end",
                message: "expected at least 3 tab-separated fields".to_string(),
            })?;

        let chrom = contig_field(line, chrom)?;
        let start0 = parse_coordinate(line, "start", start)?;
        let end0 = parse_coordinate(line, "end", end)?;
        let location = contigs.from_zero_based(chrom, start0, end0)?;

        if self.coordinates_only || rest.is_empty() {
            return Ok(Some(Feature::new(location, Payload::Bed(BedFields::default()))));
        }

        Ok(Some(Feature::new(location, Payload::Bed(parse_optional(rest)))))
    }
}

/// Parse BED columns 4 and up.
fn parse_optional(rest: &[u8]) -> BedFields {
    let text = String::from_utf8_lossy(rest);
    let mut fields = text.split('\t');
    let mut bed = BedFields::default();

    if let Some(name) = fields.next() {
        bed.name = Some(name.to_string());
    }
    if let Some(score) = fields.next() {
        bed.score = score.parse().ok();
    }
    if let Some(strand) = fields.next() {
        bed.strand = strand.chars().next().map(Strand::from_char);
    }
    bed.extra_fields = fields.map(|s| s.to_string()).collect();
    bed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contigs() -> ContigOrder {
        ContigOrder::from_pairs([("chr1", 1000), ("chr2", 500)]).unwrap()
    }

    fn decode(line: &str) -> Result<Option<Feature<Payload>>> {
        BedDecoder::new().decode(line.as_bytes(), &contigs())
    }

    #[test]
    fn test_decode_bed3() {
        let feature = decode("chr1\t9\t20").unwrap().unwrap();
        assert_eq!(feature.contig(), "chr1");
        assert_eq!(feature.start(), 10);
        assert_eq!(feature.stop(), 20);
        assert_eq!(feature.payload(), &Payload::Bed(BedFields::default()));
    }

    #[test]
    fn test_decode_bed6() {
        let feature = decode("chr2\t100\t200\tgene1\t500\t+\n").unwrap().unwrap();
        let Payload::Bed(bed) = feature.payload() else {
            panic!("expected BED payload");
        };
        assert_eq!(bed.name.as_deref(), Some("gene1"));
        assert_eq!(bed.score, Some(500.0));
        assert_eq!(bed.strand, Some(Strand::Plus));
        assert!(bed.extra_fields.is_empty());
    }

    #[test]
    fn test_decode_extra_columns() {
        let feature = decode("chr1\t0\t10\tx\t0\t-\t2\t8\t0,0,0")
            .unwrap()
            .unwrap();
        let Payload::Bed(bed) = feature.payload() else {
            panic!("expected BED payload");
        };
        assert_eq!(bed.extra_fields, vec!["2", "8", "0,0,0"]);
    }

    #[test]
    fn test_coordinates_only() {
        let mut decoder = BedDecoder::new().with_coordinates_only(true);
        let feature = decoder
            .decode(b"chr1\t0\t10\tname\t5\t+", &contigs())
            .unwrap()
            .unwrap();
        assert_eq!(feature.payload(), &Payload::Bed(BedFields::default()));
    }

    #[test]
    fn test_skip_headers() {
        assert!(decode("# comment").unwrap().is_none());
        assert!(decode("track name=test").unwrap().is_none());
        assert!(decode("browser position chr1:1-1000").unwrap().is_none());
        assert!(decode("").unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            decode("chr1\t100"),
            Err(RodError::MalformedLocation { field: "end", .. })
        ));
        assert!(matches!(
            decode("chr1\tabc\t100"),
            Err(RodError::MalformedLocation { field: "start", .. })
        ));
        assert!(matches!(
            decode("chr1\t100\t50"),
            Err(RodError::MalformedLocation { field: "end", .. })
        ));
        assert!(matches!(
            decode("chr1\t100\t100"),
            Err(RodError::MalformedLocation { .. })
        ));
        assert!(matches!(
            decode("chrUn\t1\t10"),
            Err(RodError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_split_bed3() {
        assert_eq!(
            split_bed3(b"chr1\t100\t200"),
            Some((&b"chr1"[..], &b"100"[..], &b"200"[..], &b""[..]))
        );
        assert_eq!(
            split_bed3(b"chr1\t100\t200\tname\t5"),
            Some((&b"chr1"[..], &b"100"[..], &b"200"[..], &b"name\t5"[..]))
        );
        assert_eq!(split_bed3(b"chr1\t100"), None);
    }
}
