//! Parallel processing by contig shards using Rayon.
//!
//! Each shard owns its manager, tracks, windows and sources; only the
//! contig dictionary, configuration and block indexes are shared (read-only).

use crate::engine::Engine;
use crate::error::{Result, RodError};
use crate::track::{ContigScope, TrackStats};
use crate::traversal::{Traversal, TraversalStep, Walker};
use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Consecutive steps on one contig.
#[derive(Debug, Clone)]
pub struct Shard {
    /// Position of the shard in cursor order.
    pub index: usize,
    pub contig: Arc<str>,
    pub rank: u32,
    /// Rank of the following shard's contig.
    pub next_rank: Option<u32>,
    pub steps: Vec<TraversalStep>,
}

impl Shard {
    /// Contigs whose features this shard counts: everything before the
    /// next shard, and for all but the first shard nothing before its own
    /// contig. Merged shard statistics then match a single run.
    pub fn scope(&self) -> ContigScope {
        ContigScope {
            first: (self.index > 0).then_some(self.rank),
            next: self.next_rank,
        }
    }
}

/// What one shard produced.
pub struct ShardOutput<W: Walker> {
    pub index: usize,
    pub contig: Arc<str>,
    pub walker: W,
    pub sum: W::Sum,
    pub stats: Vec<(String, TrackStats)>,
}

/// Group steps by the contig of their cursor.
///
/// Steps must already be in cursor order; a contig that comes back after a
/// later one fails with `NonMonotonicCursor`.
pub fn shard_by_contig(steps: Vec<TraversalStep>) -> Result<Vec<Shard>> {
    let mut shards: Vec<Shard> = Vec::new();
    let mut last_rank: Option<u32> = None;

    for step in steps {
        let cursor = step.cursor();
        match last_rank {
            Some(rank) if rank == cursor.rank() => {}
            Some(rank) if rank > cursor.rank() => {
                let previous = shards
                    .last()
                    .and_then(|s| s.steps.last())
                    .map(|s| s.cursor().to_string())
                    .unwrap_or_default();
                return Err(RodError::NonMonotonicCursor {
                    track: "*".to_string(),
                    previous,
                    current: cursor.to_string(),
                });
            }
            _ => {
                if let Some(last) = shards.last_mut() {
                    last.next_rank = Some(cursor.rank());
                }
                shards.push(Shard {
                    index: shards.len(),
                    contig: cursor.contig_arc().clone(),
                    rank: cursor.rank(),
                    next_rank: None,
                    steps: Vec::new(),
                });
                last_rank = Some(cursor.rank());
            }
        }
        if let Some(shard) = shards.last_mut() {
            shard.steps.push(step);
        }
    }

    Ok(shards)
}

/// Run every shard on the Rayon pool and return the outputs in cursor order.
///
/// Finished shards are reported over a channel; the first failing shard (in
/// cursor order) decides the error.
pub fn run_sharded<W, F>(
    engine: &Engine,
    traversal: &Traversal,
    shards: Vec<Shard>,
    make_walker: F,
) -> Result<Vec<ShardOutput<W>>>
where
    W: Walker + Send,
    W::Sum: Send,
    F: Fn(&Shard) -> W + Sync,
{
    let total = shards.len();
    let finished = AtomicUsize::new(0);
    let (tx, rx) = crossbeam_channel::unbounded::<(usize, Result<ShardOutput<W>>)>();

    rayon::scope(|scope| {
        for shard in &shards {
            let tx = tx.clone();
            let finished = &finished;
            let make_walker = &make_walker;
            scope.spawn(move |_| {
                debug!(
                    "Shard {} ({}): {} steps",
                    shard.index,
                    shard.contig,
                    shard.steps.len()
                );
                let result = run_shard(engine, traversal, shard, make_walker);
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                info!("Finished {} [{}/{}]", shard.contig, done, total);
                // The receiver outlives the scope
                let _ = tx.send((shard.index, result));
            });
        }
    });
    drop(tx);

    let mut results: Vec<(usize, Result<ShardOutput<W>>)> = rx.into_iter().collect();
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

fn run_shard<W, F>(
    engine: &Engine,
    traversal: &Traversal,
    shard: &Shard,
    make_walker: &F,
) -> Result<ShardOutput<W>>
where
    W: Walker,
    F: Fn(&Shard) -> W,
{
    let mut manager = engine.open_manager()?;
    manager.set_contig_scope(shard.scope());
    let mut walker = make_walker(shard);
    let sum = traversal.run(&mut manager, shard.steps.iter().cloned(), &mut walker)?;
    Ok(ShardOutput {
        index: shard.index,
        contig: shard.contig.clone(),
        walker,
        sum,
        stats: manager.stats(),
    })
}
