//! Error types for the ROD engine.
//!
//! Every error raised while reading a track carries the track name and
//! enough textual context (line, byte offset or record index) to find the
//! offending record again.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Position of a record inside its input, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPos {
    /// 1-based line number in a text stream.
    Line(usize),
    /// Byte offset of the start of the line (memory-mapped sources).
    Offset(u64),
    /// 1-based record index (in-memory sources).
    Record(usize),
}

impl fmt::Display for RecordPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPos::Line(n) => write!(f, "line {}", n),
            RecordPos::Offset(n) => write!(f, "byte offset {}", n),
            RecordPos::Record(n) => write!(f, "record {}", n),
        }
    }
}

/// Errors that can occur while building locations, reading tracks or
/// driving a traversal.
#[derive(Error, Debug)]
pub enum RodError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed location '{text}': invalid {field} ({message})")]
    MalformedLocation {
        text: String,
        field: &'static str,
        message: String,
    },

    #[error("Malformed record in track '{track}' at {at}: {message} [{raw}]")]
    MalformedFeature {
        track: String,
        at: RecordPos,
        raw: String,
        message: String,
    },

    #[error(
        "Track '{track}' is not sorted: {current} at {at} (record {record}) comes after {previous}"
    )]
    UnsortedInput {
        track: String,
        record: usize,
        at: RecordPos,
        previous: String,
        current: String,
    },

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Cannot merge {a} and {b}: intervals must overlap or be adjacent on the same contig")]
    UnmergeableLocation { a: String, b: String },

    #[error("Track '{track}' does not support seeking ({kind} source)")]
    UnsupportedSeek { track: String, kind: &'static str },

    #[error(
        "Track '{track}': feature {location} spans {span} bp, above the window ceiling of {limit} bp (raise --max-window)"
    )]
    WindowOverflow {
        track: String,
        location: String,
        span: u64,
        limit: u64,
    },

    #[error("Track '{track}': cursor {current} moves backwards from {previous}")]
    NonMonotonicCursor {
        track: String,
        previous: String,
        current: String,
    },

    #[error("Track '{track}': query {cursor} reaches past the filled window ({filled})")]
    WindowNotFilled {
        track: String,
        cursor: String,
        filled: String,
    },

    #[error("Duplicate track name '{0}'")]
    DuplicateTrack(String),

    #[error("Unknown track '{0}'")]
    UnknownTrack(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index {} is stale or invalid: {reason}", index.display())]
    StaleIndex { index: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, RodError>;

impl RodError {
    /// Attach a path to a bare I/O error.
    pub fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RodError::IoAt {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by a single bad record, which the skip
    /// policies are allowed to recover from.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            RodError::MalformedLocation { .. } | RodError::MalformedFeature { .. }
        )
    }

    /// Name of the track the error was raised on, if any.
    pub fn track(&self) -> Option<&str> {
        match self {
            RodError::MalformedFeature { track, .. }
            | RodError::UnsortedInput { track, .. }
            | RodError::UnsupportedSeek { track, .. }
            | RodError::WindowOverflow { track, .. }
            | RodError::NonMonotonicCursor { track, .. }
            | RodError::WindowNotFilled { track, .. } => Some(track),
            RodError::DuplicateTrack(name) | RodError::UnknownTrack(name) => Some(name),
            _ => None,
        }
    }
}
