//! Contig dictionary: the rank table every location is ordered by.
//!
//! Parses `.genome` files (tab-delimited: `chrom\tsize`) and sequence
//! dictionaries (`@SQ\tSN:chr1\tLN:248956422`). Contig order follows the
//! input file.

use crate::error::{Result, RodError};
use crate::location::GenomeLocation;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Contig names with their ranks (file order) and lengths.
///
/// Built once per run and shared read-only, usually behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ContigOrder {
    names: Vec<Arc<str>>,
    lengths: Vec<u64>,
    ranks: FxHashMap<Arc<str>, u32>,
}

impl ContigOrder {
    /// Build from `(name, length)` pairs in rank order.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut order = Self::default();
        for (name, length) in pairs {
            order.push(name.as_ref(), length)?;
        }
        Ok(order)
    }

    /// Load a dictionary from a genome file or a sequence dictionary.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RodError::io_at(path, e))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a dictionary from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut order = Self::default();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('@') {
                if let Some((name, length)) = parse_dict_line(line, line_num + 1)? {
                    order.push(name, length)?;
                }
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(RodError::Config(format!(
                    "contig dictionary line {}: expected two columns (name, length)",
                    line_num + 1
                )));
            }

            let length: u64 = fields[1].parse().map_err(|_| {
                RodError::Config(format!(
                    "contig dictionary line {}: invalid contig length '{}'",
                    line_num + 1,
                    fields[1]
                ))
            })?;
            order.push(fields[0], length)?;
        }

        if order.is_empty() {
            return Err(RodError::Config(
                "contig dictionary contains no contigs".to_string(),
            ));
        }
        Ok(order)
    }

    fn push(&mut self, name: &str, length: u64) -> Result<()> {
        if self.ranks.contains_key(name) {
            return Err(RodError::Config(format!(
                "contig '{}' appears twice in the dictionary",
                name
            )));
        }
        let name: Arc<str> = Arc::from(name);
        self.ranks.insert(name.clone(), self.names.len() as u32);
        self.names.push(name);
        self.lengths.push(length);
        Ok(())
    }

    /// Number of contigs.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rank of a contig, or `InvalidLocation` if it is not in the dictionary.
    #[inline]
    pub fn rank(&self, contig: &str) -> Result<u32> {
        self.ranks.get(contig).copied().ok_or_else(|| {
            RodError::InvalidLocation(format!(
                "contig '{}' is not in the reference dictionary",
                contig
            ))
        })
    }

    #[inline]
    pub fn contains(&self, contig: &str) -> bool {
        self.ranks.contains_key(contig)
    }

    /// Contig name at a rank.
    #[inline]
    pub fn name(&self, rank: u32) -> Option<&Arc<str>> {
        self.names.get(rank as usize)
    }

    /// Length of the contig at a rank.
    #[inline]
    pub fn length(&self, rank: u32) -> Option<u64> {
        self.lengths.get(rank as usize).copied()
    }

    /// All contigs as `(name, length)` in rank order.
    pub fn contigs(&self) -> impl Iterator<Item = (&str, u64)> {
        self.names
            .iter()
            .zip(self.lengths.iter())
            .map(|(n, &l)| (n.as_ref(), l))
    }

    /// Build a closed, 1-based location.
    ///
    /// Rejects unknown contigs (`InvalidLocation`) and `start < 1` or
    /// `stop < start` (`MalformedLocation`).
    pub fn location(&self, contig: &str, start: u64, stop: u64) -> Result<GenomeLocation> {
        let rank = self.rank(contig)?;
        if start < 1 {
            return Err(RodError::MalformedLocation {
                text: format!("{}:{}-{}", contig, start, stop),
                field: "start",
                message: "positions are 1-based".to_string(),
            });
        }
        if stop < start {
            return Err(RodError::MalformedLocation {
                text: format!("{}:{}-{}", contig, start, stop),
                field: "stop",
                message: format!("stop {} is less than start {}", stop, start),
            });
        }
        Ok(GenomeLocation::from_parts(
            self.names[rank as usize].clone(),
            rank,
            start,
            stop,
        ))
    }

    /// Like [`location`](Self::location), but `stop` must also lie within
    /// the contig's length. Contigs of unknown length (0) are unbounded.
    pub fn bounded_location(&self, contig: &str, start: u64, stop: u64) -> Result<GenomeLocation> {
        let rank = self.rank(contig)?;
        let length = self.lengths[rank as usize];
        if length > 0 && stop > length {
            return Err(RodError::MalformedLocation {
                text: format!("{}:{}-{}", contig, start, stop),
                field: "stop",
                message: format!("{} exceeds the contig length {}", stop, length),
            });
        }
        self.location(contig, start, stop)
    }

    /// Single-base location.
    #[inline]
    pub fn locus(&self, contig: &str, pos: u64) -> Result<GenomeLocation> {
        self.location(contig, pos, pos)
    }

    /// Convert 0-based, half-open coordinates: `start = start0 + 1`,
    /// `stop = stop0`. Empty intervals (`start0 == stop0`) are rejected.
    pub fn from_zero_based(&self, contig: &str, start0: u64, stop0: u64) -> Result<GenomeLocation> {
        if stop0 <= start0 {
            return Err(RodError::MalformedLocation {
                text: format!("{}\t{}\t{}", contig, start0, stop0),
                field: "end",
                message: if stop0 == start0 {
                    "empty interval".to_string()
                } else {
                    format!("end {} is less than start {}", stop0, start0)
                },
            });
        }
        self.location(contig, start0 + 1, stop0)
    }

    /// Location covering an entire contig.
    pub fn whole_contig(&self, contig: &str) -> Result<GenomeLocation> {
        let rank = self.rank(contig)?;
        let length = self.lengths[rank as usize].max(1);
        self.location(contig, 1, length)
    }

    /// Parse `chr1`, `chr1:100`, `chr1:100-200`, `chr1:1,000-2,000` or
    /// `chr1:100+` (to the end of the contig).
    ///
    /// Contig names may themselves contain `:` (`HLA-A*01:01:01:01`): the
    /// whole text is tried as a contig first, then the range is taken after
    /// the last `:`. The result must lie within the contig's length.
    pub fn parse_location(&self, text: &str) -> Result<GenomeLocation> {
        let text = text.trim();
        if self.contains(text) {
            return self.whole_contig(text);
        }
        let Some((contig, range)) = text.rsplit_once(':') else {
            return self.whole_contig(text);
        };

        let rank = self.rank(contig)?;
        let length = self.lengths[rank as usize];

        let (start, stop) = if let Some((a, b)) = range.split_once('-') {
            (
                parse_position(text, a, "start")?,
                parse_position(text, b, "stop")?,
            )
        } else if let Some(a) = range.strip_suffix('+') {
            (parse_position(text, a, "start")?, length)
        } else {
            let pos = parse_position(text, range, "start")?;
            (pos, pos)
        };

        self.bounded_location(contig, start, stop)
            .map_err(|e| match e {
                RodError::MalformedLocation { field, message, .. } => {
                    RodError::MalformedLocation {
                        text: text.to_string(),
                        field,
                        message,
                    }
                }
                other => other,
            })
    }

    /// Check that a location was built from this dictionary.
    pub fn validate(&self, loc: &GenomeLocation) -> Result<()> {
        match self.names.get(loc.rank() as usize) {
            Some(name) if name.as_ref() == loc.contig() => Ok(()),
            _ => Err(RodError::InvalidLocation(format!(
                "{} does not belong to this reference dictionary",
                loc
            ))),
        }
    }

    /// Total order over locations: rank, then start, then stop.
    pub fn compare(&self, a: &GenomeLocation, b: &GenomeLocation) -> Result<Ordering> {
        self.validate(a)?;
        self.validate(b)?;
        Ok(a.cmp(b))
    }
}

/// Parse one `@SQ` line of a sequence dictionary. Other header lines yield
/// `None`.
fn parse_dict_line(line: &str, line_num: usize) -> Result<Option<(&str, u64)>> {
    let mut fields = line.split('\t');
    if fields.next() != Some("@SQ") {
        return Ok(None);
    }

    let mut name = None;
    let mut length = None;
    for field in fields {
        if let Some(v) = field.strip_prefix("SN:") {
            name = Some(v);
        } else if let Some(v) = field.strip_prefix("LN:") {
            length = Some(v.parse::<u64>().map_err(|_| {
                RodError::Config(format!(
                    "sequence dictionary line {}: invalid LN '{}'",
                    line_num, v
                ))
            })?);
        }
    }

    match (name, length) {
        (Some(n), Some(l)) => Ok(Some((n, l))),
        _ => Err(RodError::Config(format!(
            "sequence dictionary line {}: @SQ requires SN and LN",
            line_num
        ))),
    }
}

/// Parse a position like `1,000,000`.
fn parse_position(text: &str, pos: &str, field: &'static str) -> Result<u64> {
    let malformed = |message: &str| RodError::MalformedLocation {
        text: text.to_string(),
        field,
        message: message.to_string(),
    };

    let digits: String = pos.chars().filter(|&c| c != ',').collect();
    if digits.is_empty() {
        return Err(malformed("missing position"));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("not a number"));
    }
    digits.parse().map_err(|_| malformed("position out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dict() -> ContigOrder {
        ContigOrder::from_pairs([("chr1", 1000), ("chr2", 500)]).unwrap()
    }

    #[test]
    fn test_contigs_from_genome_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t1000000").unwrap();
        writeln!(file, "chr2\t500000").unwrap();
        writeln!(file, "# comment line").unwrap();
        writeln!(file, "chr10\t250000").unwrap();

        let contigs = ContigOrder::from_file(file.path()).unwrap();

        assert_eq!(contigs.len(), 3);
        assert_eq!(contigs.rank("chr1").unwrap(), 0);
        assert_eq!(contigs.rank("chr2").unwrap(), 1);
        assert_eq!(contigs.rank("chr10").unwrap(), 2);
        assert_eq!(contigs.length(2), Some(250000));
        assert!(contigs.rank("chr3").is_err());
    }

    #[test]
    fn test_contigs_from_sequence_dictionary() {
        let content = "@HD\tVN:1.6\n@SQ\tSN:chrM\tLN:16569\n@SQ\tSN:chr1\tLN:248956422\tM5:abc\n";
        let contigs = ContigOrder::from_reader(content.as_bytes()).unwrap();
        assert_eq!(contigs.len(), 2);
        assert_eq!(contigs.name(0).map(|n| n.as_ref()), Some("chrM"));
        assert_eq!(contigs.length(1), Some(248956422));
    }

    #[test]
    fn test_duplicate_contig_rejected() {
        let err = ContigOrder::from_pairs([("chr1", 10), ("chr1", 20)]).unwrap_err();
        assert!(matches!(err, RodError::Config(_)));
    }

    #[test]
    fn test_location_construction() {
        let contigs = dict();
        let loc = contigs.location("chr2", 10, 20).unwrap();
        assert_eq!(loc.rank(), 1);
        assert_eq!(loc.contig(), "chr2");

        assert!(matches!(
            contigs.location("chr1", 20, 10),
            Err(RodError::MalformedLocation { field: "stop", .. })
        ));
        assert!(matches!(
            contigs.location("chr1", 0, 10),
            Err(RodError::MalformedLocation { field: "start", .. })
        ));
        assert!(matches!(
            contigs.location("chrUn", 1, 10),
            Err(RodError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_zero_based_round_trip() {
        let contigs = dict();
        for (start0, stop0) in [(0, 1), (9, 20), (99, 1000), (499, 500)] {
            let loc = contigs.from_zero_based("chr1", start0, stop0).unwrap();
            assert_eq!(loc.start(), start0 + 1);
            assert_eq!(loc.stop(), stop0);
            assert_eq!(loc.to_zero_based(), (start0, stop0));
        }
        assert!(contigs.from_zero_based("chr1", 10, 10).is_err());
        assert!(contigs.from_zero_based("chr1", 10, 5).is_err());
    }

    #[test]
    fn test_parse_location_forms() {
        let contigs = ContigOrder::from_pairs([("chr1", 3_000_000)]).unwrap();

        let whole = contigs.parse_location("chr1").unwrap();
        assert_eq!((whole.start(), whole.stop()), (1, 3_000_000));

        let point = contigs.parse_location("chr1:100").unwrap();
        assert_eq!((point.start(), point.stop()), (100, 100));

        let range = contigs.parse_location("chr1:1,000,000-2,000,000").unwrap();
        assert_eq!((range.start(), range.stop()), (1_000_000, 2_000_000));

        let tail = contigs.parse_location("chr1:2,999,000+").unwrap();
        assert_eq!((tail.start(), tail.stop()), (2_999_000, 3_000_000));
    }

    #[test]
    fn test_parse_location_errors() {
        let contigs = dict();
        assert!(matches!(
            contigs.parse_location("chr1:abc-10"),
            Err(RodError::MalformedLocation { field: "start", .. })
        ));
        assert!(matches!(
            contigs.parse_location("chr1:50-10"),
            Err(RodError::MalformedLocation { field: "stop", .. })
        ));
        assert!(matches!(
            contigs.parse_location("chr1:900-1001"),
            Err(RodError::MalformedLocation { field: "stop", .. })
        ));
        assert!(matches!(
            contigs.parse_location("chrX:1-10"),
            Err(RodError::InvalidLocation(_))
        ));
        let err = contigs.parse_location("chr1:50-10").unwrap_err();
        assert!(err.to_string().contains("chr1:50-10"));
    }

    #[test]
    fn test_parse_location_contig_with_colons() {
        let contigs =
            ContigOrder::from_pairs([("chr1", 1000), ("HLA-A*01:01:01:01", 3503)]).unwrap();

        let whole = contigs.parse_location("HLA-A*01:01:01:01").unwrap();
        assert_eq!(whole.contig(), "HLA-A*01:01:01:01");
        assert_eq!((whole.start(), whole.stop()), (1, 3503));

        let range = contigs.parse_location("HLA-A*01:01:01:01:5-10").unwrap();
        assert_eq!(range.contig(), "HLA-A*01:01:01:01");
        assert_eq!((range.start(), range.stop()), (5, 10));

        assert!(matches!(
            contigs.parse_location("HLA-A*01:01:01:02:5-10"),
            Err(RodError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_bounded_location() {
        let contigs = ContigOrder::from_pairs([("chr1", 1000), ("chrU", 0)]).unwrap();
        assert_eq!(contigs.bounded_location("chr1", 1, 1000).unwrap().stop(), 1000);
        assert!(matches!(
            contigs.bounded_location("chr1", 1, 1001),
            Err(RodError::MalformedLocation { field: "stop", .. })
        ));
        // Unknown length
        assert!(contigs.bounded_location("chrU", 1, 1_000_000).is_ok());
    }

    #[test]
    fn test_compare_checks_dictionary() {
        let contigs = dict();
        let a = contigs.location("chr1", 10, 20).unwrap();
        let b = contigs.location("chr2", 1, 5).unwrap();
        assert_eq!(contigs.compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(contigs.compare(&b, &a).unwrap(), Ordering::Greater);

        let other = ContigOrder::from_pairs([("chr2", 500), ("chr1", 1000)]).unwrap();
        let foreign = other.location("chr2", 1, 5).unwrap();
        assert!(matches!(
            contigs.compare(&a, &foreign),
            Err(RodError::InvalidLocation(_))
        ));
    }
}
