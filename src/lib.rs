// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! rodwalk: reference-ordered data iteration
//!
//! Streams any number of coordinate-sorted feature tracks in lockstep with a
//! primary traversal (loci, reads or intervals), keeping only the features
//! that can still overlap the cursor in memory.
//!
//! # Features
//!
//! - **Bounded memory**: each track keeps a sliding window of features
//! - **Seekable inputs**: memory-mapped files with a block index
//! - **Parallel processing**: one independent traversal per contig via Rayon
//!
//! # Example
//!
//! ```rust,no_run
//! use rodwalk::prelude::*;
//! use std::sync::Arc;
//!
//! let contigs = Arc::new(ContigOrder::from_file("genome.dict").unwrap());
//! let engine = Engine::new(
//!     contigs.clone(),
//!     EngineConfig::default(),
//!     vec![TrackConfig::new("genes", "genes.bed")],
//! )
//! .unwrap();
//!
//! let mut manager = engine.open_manager().unwrap();
//! let cursor = contigs.locus("chr1", 12_000).unwrap();
//! for (track, features) in manager.overlaps(&cursor).unwrap() {
//!     println!("{}: {} features", track, features.len());
//! }
//! ```

pub mod codec;
pub mod config;
pub mod contig;
pub mod engine;
pub mod error;
pub mod feature;
pub mod index;
pub mod location;
pub mod manager;
pub mod output;
pub mod parallel;
pub mod report;
pub mod source;
pub mod track;
pub mod traversal;
pub mod window;

// Re-export commonly used types
pub use config::{Codec, EngineConfig, ErrorPolicy, TrackConfig};
pub use contig::ContigOrder;
pub use engine::Engine;
pub use error::{Result, RodError};
pub use feature::{BedFields, Feature, Payload, Strand};
pub use location::GenomeLocation;
pub use manager::{RodView, TrackManager};
pub use track::RodTrack;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Codec, EngineConfig, ErrorPolicy, TrackConfig};
    pub use crate::contig::ContigOrder;
    pub use crate::engine::Engine;
    pub use crate::error::{Result, RodError};
    pub use crate::feature::{BedFields, Feature, Payload, Strand};
    pub use crate::index::FeatureIndex;
    pub use crate::location::GenomeLocation;
    pub use crate::manager::{RodView, TrackManager};
    pub use crate::source::{FeatureSource, IndexedSource, MemorySource, SequentialSource};
    pub use crate::track::RodTrack;
    pub use crate::traversal::{Traversal, TraversalStep, Walker};
}
