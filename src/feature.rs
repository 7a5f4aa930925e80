//! Decoded features: a location plus a codec-specific payload.

use crate::location::GenomeLocation;
use std::fmt;

/// One decoded record of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<P = Payload> {
    location: GenomeLocation,
    payload: P,
}

impl<P> Feature<P> {
    pub fn new(location: GenomeLocation, payload: P) -> Self {
        Self { location, payload }
    }

    #[inline]
    pub fn location(&self) -> &GenomeLocation {
        &self.location
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.location.start()
    }

    #[inline]
    pub fn stop(&self) -> u64 {
        self.location.stop()
    }

    #[inline]
    pub fn contig(&self) -> &str {
        self.location.contig()
    }

    pub fn into_parts(self) -> (GenomeLocation, P) {
        (self.location, self.payload)
    }
}

/// Payloads produced by the built-in codecs.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A bare interval with no further data (locus lists).
    Interval,
    /// Optional BED columns beyond the coordinates.
    Bed(BedFields),
}

impl Payload {
    /// Name column, when the codec carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Payload::Bed(fields) => fields.name.as_deref(),
            Payload::Interval => None,
        }
    }
}

/// BED columns 4 and up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BedFields {
    pub name: Option<String>,
    pub score: Option<f64>,
    pub strand: Option<Strand>,
    /// Columns beyond BED6, verbatim.
    pub extra_fields: Vec<String>,
}

/// Strand orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
    Unknown,
}

impl Strand {
    pub fn from_char(c: char) -> Self {
        match c {
            '+' => Strand::Plus,
            '-' => Strand::Minus,
            _ => Strand::Unknown,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
            Strand::Unknown => write!(f, "."),
        }
    }
}
