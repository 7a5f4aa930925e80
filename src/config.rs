//! Run configuration for the ROD engine.
//!
//! Everything here is plain data, built once before a traversal starts
//! (by the CLI or by library callers) and shared read-only by every shard.

use crate::codec::{BedDecoder, Decoder, LocusDecoder};
use crate::error::{Result, RodError};
use crate::feature::Payload;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default input buffer size (256 KB).
/// Good balance for reading sorted track files.
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Low-memory input buffer size (64 KB).
pub const LOW_MEMORY_INPUT_BUFFER: usize = 64 * 1024;

/// Default output buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Low-memory output buffer size (256 KB).
pub const LOW_MEMORY_OUTPUT_BUFFER: usize = 256 * 1024;

/// Default ceiling on a single feature's span (10 Mb).
pub const DEFAULT_MAX_WINDOW: u64 = 10_000_000;

/// Returns the appropriate input buffer size based on low_memory flag.
#[inline]
pub const fn input_buffer_size(low_memory: bool) -> usize {
    if low_memory {
        LOW_MEMORY_INPUT_BUFFER
    } else {
        DEFAULT_INPUT_BUFFER
    }
}

/// Returns the appropriate output buffer size based on low_memory flag.
#[inline]
pub const fn output_buffer_size(low_memory: bool) -> usize {
    if low_memory {
        LOW_MEMORY_OUTPUT_BUFFER
    } else {
        DEFAULT_OUTPUT_BUFFER
    }
}

/// What to do with a record that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Propagate the error and stop the traversal.
    #[default]
    Abort,
    /// Log the record and keep reading.
    SkipRecord,
    /// Log, close the track, and report no further features from it.
    DropTrack,
}

impl FromStr for ErrorPolicy {
    type Err = RodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(ErrorPolicy::Abort),
            "skip" | "skip-record" => Ok(ErrorPolicy::SkipRecord),
            "drop" | "drop-track" => Ok(ErrorPolicy::DropTrack),
            _ => Err(RodError::Config(format!(
                "unknown error policy '{}' (expected abort, skip-record or drop-track)",
                s
            ))),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorPolicy::Abort => "abort",
            ErrorPolicy::SkipRecord => "skip-record",
            ErrorPolicy::DropTrack => "drop-track",
        })
    }
}

/// Built-in record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Bed,
    Loci,
}

impl Codec {
    /// Guess the codec from a file extension (`.list`, `.intervals`,
    /// `.interval_list` and `.loci` are locus lists, everything else is
    /// BED). Compressed names are refused separately by
    /// [`check_uncompressed`].
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if [".list", ".intervals", ".interval_list", ".loci"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Codec::Loci
        } else {
            Codec::Bed
        }
    }

    /// Fresh decoder for one source.
    pub fn decoder(self) -> Box<dyn Decoder<Payload> + Send> {
        match self {
            Codec::Bed => Box::new(BedDecoder::new()),
            Codec::Loci => Box::new(LocusDecoder::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Bed => "bed",
            Codec::Loci => "loci",
        }
    }
}

/// Compressed suffixes that no source can read.
const COMPRESSED_SUFFIXES: [&str; 3] = [".gz", ".bgz", ".bz2"];

/// Refuse compressed input up front.
pub fn check_uncompressed(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match COMPRESSED_SUFFIXES.iter().find(|ext| name.ends_with(*ext)) {
        Some(ext) => Err(RodError::Config(format!(
            "{}: compressed ({}) input is not supported, decompress it first",
            path.display(),
            ext
        ))),
        None => Ok(()),
    }
}

impl FromStr for Codec {
    type Err = RodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bed" => Ok(Codec::Bed),
            "loci" | "list" | "intervals" | "interval_list" => Ok(Codec::Loci),
            _ => Err(RodError::Config(format!(
                "unknown codec '{}' (expected bed or loci)",
                s
            ))),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bases of lookahead past the cursor stop when filling windows.
    pub padding: u64,
    /// Largest feature span (bp) a window may hold.
    pub max_window: u64,
    /// Default malformed-record policy for tracks that set none.
    pub error_policy: ErrorPolicy,
    /// Read buffer size for file-backed sources.
    pub input_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            padding: 0,
            max_window: DEFAULT_MAX_WINDOW,
            error_policy: ErrorPolicy::Abort,
            input_buffer: DEFAULT_INPUT_BUFFER,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding(mut self, padding: u64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_max_window(mut self, max_window: u64) -> Self {
        self.max_window = max_window;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_low_memory(mut self, low_memory: bool) -> Self {
        self.input_buffer = input_buffer_size(low_memory);
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_window == 0 {
            return Err(RodError::Config("max window must be at least 1 bp".to_string()));
        }
        if self.input_buffer == 0 {
            return Err(RodError::Config("input buffer must not be empty".to_string()));
        }
        Ok(())
    }
}

/// One input track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackConfig {
    pub name: String,
    pub path: PathBuf,
    pub codec: Codec,
    /// Block index for seekable access; `None` streams the file.
    pub index: Option<PathBuf>,
    /// Overrides [`EngineConfig::error_policy`] for this track.
    pub error_policy: Option<ErrorPolicy>,
}

impl TrackConfig {
    /// Track with the codec guessed from the path.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            codec: Codec::from_path(&path),
            path,
            index: None,
            error_policy: None,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_index(mut self, index: impl Into<PathBuf>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = Some(policy);
        self
    }

    /// Effective policy given the engine default.
    pub fn policy(&self, engine: &EngineConfig) -> ErrorPolicy {
        self.error_policy.unwrap_or(engine.error_policy)
    }
}

/// Parses `name=path[,codec=bed][,index=path][,on-error=skip-record]`.
///
/// A bare path is accepted too; the file stem becomes the track name.
impl FromStr for TrackConfig {
    type Err = RodError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',');
        let head = parts.next().unwrap_or_default().trim();
        if head.is_empty() {
            return Err(RodError::Config("empty track specification".to_string()));
        }

        let mut track = match head.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => {
                TrackConfig::new(name, path)
            }
            Some(_) => {
                return Err(RodError::Config(format!(
                    "track '{}': expected name=path",
                    s
                )))
            }
            None => {
                let path = PathBuf::from(head);
                let name = path
                    .file_stem()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| head.to_string());
                TrackConfig::new(name, path)
            }
        };

        for option in parts {
            let (key, value) = option.split_once('=').ok_or_else(|| {
                RodError::Config(format!("track '{}': option '{}' is not key=value", s, option))
            })?;
            match key.trim() {
                "codec" => track.codec = value.trim().parse()?,
                "index" => track.index = Some(PathBuf::from(value.trim())),
                "on-error" | "on_error" => track.error_policy = Some(value.trim().parse()?),
                other => {
                    return Err(RodError::Config(format!(
                        "track '{}': unknown option '{}'",
                        s, other
                    )))
                }
            }
        }

        Ok(track)
    }
}
