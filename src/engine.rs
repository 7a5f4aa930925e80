//! Wiring from configuration to running traversals.

use crate::config::{check_uncompressed, EngineConfig, TrackConfig};
use crate::contig::ContigOrder;
use crate::error::{Result, RodError};
use crate::feature::Payload;
use crate::index::FeatureIndex;
use crate::manager::TrackManager;
use crate::parallel::{run_sharded, shard_by_contig, Shard, ShardOutput};
use crate::source::{FeatureSource, IndexedSource, SequentialSource, SourceStats};
use crate::track::{RodTrack, TrackStats};
use crate::traversal::{Traversal, TraversalStep, Walker};
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Immutable run setup shared by every shard.
#[derive(Debug)]
pub struct Engine {
    contigs: Arc<ContigOrder>,
    config: EngineConfig,
    tracks: Vec<TrackConfig>,
    indexes: FxHashMap<String, Arc<FeatureIndex>>,
}

impl Engine {
    /// Validate the configuration and load every track's index.
    pub fn new(contigs: Arc<ContigOrder>, config: EngineConfig, tracks: Vec<TrackConfig>) -> Result<Self> {
        config.validate()?;

        let mut seen = FxHashSet::default();
        for track in &tracks {
            if !seen.insert(track.name.as_str()) {
                return Err(RodError::DuplicateTrack(track.name.clone()));
            }
            check_uncompressed(&track.path)?;
        }

        let mut indexes = FxHashMap::default();
        for track in &tracks {
            if let Some(path) = &track.index {
                let index = FeatureIndex::read(path, &contigs)?;
                debug!(
                    "Loaded index {} for track '{}' ({} blocks)",
                    path.display(),
                    track.name,
                    index.block_count()
                );
                indexes.insert(track.name.clone(), Arc::new(index));
            }
        }

        info!(
            "Engine ready: {} contigs, {} tracks ({} indexed)",
            contigs.len(),
            tracks.len(),
            indexes.len()
        );
        Ok(Self {
            contigs,
            config,
            tracks,
            indexes,
        })
    }

    pub fn contigs(&self) -> &Arc<ContigOrder> {
        &self.contigs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[TrackConfig] {
        &self.tracks
    }

    /// Open a fresh source for `track`: indexed when an index is loaded,
    /// sequential otherwise.
    pub fn open_source(&self, track: &TrackConfig) -> Result<Box<dyn FeatureSource<Payload>>> {
        let policy = track.policy(&self.config);
        let decoder = track.codec.decoder();

        let source: Box<dyn FeatureSource<Payload>> = match self.indexes.get(&track.name) {
            Some(index) => Box::new(
                IndexedSource::open(
                    track.name.clone(),
                    &track.path,
                    index.clone(),
                    decoder,
                    self.contigs.clone(),
                )?
                .with_error_policy(policy),
            ),
            None => Box::new(
                SequentialSource::open(
                    track.name.clone(),
                    &track.path,
                    decoder,
                    self.contigs.clone(),
                    self.config.input_buffer,
                )?
                .with_error_policy(policy),
            ),
        };
        Ok(source)
    }

    pub fn open_track(&self, track: &TrackConfig) -> Result<RodTrack> {
        let source = self.open_source(track)?;
        Ok(RodTrack::new(source, self.config.max_window)
            .with_padding(self.config.padding)
            .with_error_policy(track.policy(&self.config)))
    }

    /// Open every configured track into a new manager.
    pub fn open_manager(&self) -> Result<TrackManager> {
        let mut manager = TrackManager::new();
        for track in &self.tracks {
            manager.add_track(self.open_track(track)?)?;
        }
        Ok(manager)
    }

    /// Single-threaded traversal over all `steps`.
    pub fn run<W: Walker>(
        &self,
        traversal: &Traversal,
        steps: Vec<TraversalStep>,
        walker: &mut W,
    ) -> Result<(W::Sum, Vec<(String, TrackStats)>)> {
        let mut manager = self.open_manager()?;
        let sum = traversal.run(&mut manager, steps, walker)?;
        Ok((sum, manager.stats()))
    }

    /// One traversal per contig of the cursor list, run in parallel.
    pub fn run_sharded<W, F>(
        &self,
        traversal: &Traversal,
        steps: Vec<TraversalStep>,
        make_walker: F,
    ) -> Result<Vec<ShardOutput<W>>>
    where
        W: Walker + Send,
        W::Sum: Send,
        F: Fn(&Shard) -> W + Sync,
    {
        let shards = shard_by_contig(steps)?;
        info!("Running {} shards", shards.len());
        run_sharded(self, traversal, shards, make_walker)
    }

    /// Stream every track end to end, checking decoding, order and the
    /// window ceiling. Tracks are checked in parallel.
    pub fn validate(&self) -> Result<Vec<(String, SourceStats)>> {
        self.tracks
            .par_iter()
            .map(|track| {
                let stats = self.validate_track(track)?;
                info!(
                    "Track '{}' OK: {} records ({} skipped)",
                    track.name, stats.records, stats.skipped
                );
                Ok((track.name.clone(), stats))
            })
            .collect()
    }

    fn validate_track(&self, track: &TrackConfig) -> Result<SourceStats> {
        let mut source = self.open_source(track)?;
        let max_window = self.config.max_window;

        while let Some(feature) = source.next_feature()? {
            let span = feature.stop() - feature.start() + 1;
            if span > max_window {
                return Err(RodError::WindowOverflow {
                    track: track.name.clone(),
                    location: feature.location().to_string(),
                    span,
                    limit: max_window,
                });
            }
        }

        let stats = source.stats();
        source.close();
        Ok(stats)
    }
}
