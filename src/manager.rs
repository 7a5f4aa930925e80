//! Merge engine: drives every track in lockstep with the traversal cursor.

use crate::error::{Result, RodError};
use crate::feature::{Feature, Payload};
use crate::location::GenomeLocation;
use crate::track::{ContigScope, RodTrack, TrackStats};
use log::debug;
use rustc_hash::FxHashMap;

/// Tracks of one traversal (one shard), in registration order.
pub struct TrackManager<P = Payload> {
    tracks: Vec<RodTrack<P>>,
    by_name: FxHashMap<String, usize>,
    last_cursor: Option<GenomeLocation>,
    steps: usize,
    closed: bool,
}

impl<P> Default for TrackManager<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TrackManager<P> {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            by_name: FxHashMap::default(),
            last_cursor: None,
            steps: 0,
            closed: false,
        }
    }

    /// Register a track. Names must be unique.
    pub fn add_track(&mut self, track: RodTrack<P>) -> Result<()> {
        if self.by_name.contains_key(track.name()) {
            return Err(RodError::DuplicateTrack(track.name().to_string()));
        }
        self.by_name.insert(track.name().to_string(), self.tracks.len());
        self.tracks.push(track);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.name())
    }

    pub fn track(&self, name: &str) -> Option<&RodTrack<P>> {
        self.by_name.get(name).map(|&i| &self.tracks[i])
    }

    /// Steps completed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run one traversal step.
    ///
    /// Every track is advanced to `cursor`, `consume` sees the overlap set
    /// of all tracks, then features behind the cursor are evicted. Any
    /// error closes every track before it is returned.
    pub fn step<T, F>(&mut self, cursor: &GenomeLocation, consume: F) -> Result<T>
    where
        F: FnOnce(&RodView<'_, P>) -> T,
    {
        match self.try_step(cursor, consume) {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!("Aborting traversal at {}: {}", cursor, e);
                self.close();
                Err(e)
            }
        }
    }

    fn try_step<T, F>(&mut self, cursor: &GenomeLocation, consume: F) -> Result<T>
    where
        F: FnOnce(&RodView<'_, P>) -> T,
    {
        if let Some(last) = &self.last_cursor {
            if cursor.starts_before(last) {
                return Err(RodError::NonMonotonicCursor {
                    track: "*".to_string(),
                    previous: last.to_string(),
                    current: cursor.to_string(),
                });
            }
        }

        for track in &mut self.tracks {
            track.advance_to(cursor)?;
        }

        let value = {
            let mut entries = Vec::with_capacity(self.tracks.len());
            for track in &self.tracks {
                entries.push((track.name(), track.features_overlapping(cursor)?));
            }
            let view = RodView {
                cursor,
                entries,
                by_name: &self.by_name,
            };
            consume(&view)
        };

        for track in &mut self.tracks {
            track.evict_before(cursor);
        }
        self.last_cursor = Some(cursor.clone());
        self.steps += 1;
        Ok(value)
    }

    /// Convenience step returning owned per-track overlap lists.
    pub fn overlaps(&mut self, cursor: &GenomeLocation) -> Result<Vec<(String, Vec<Feature<P>>)>>
    where
        P: Clone,
    {
        self.step(cursor, |view| {
            view.iter()
                .map(|(name, features)| {
                    (
                        name.to_string(),
                        features.iter().map(|&f| f.clone()).collect(),
                    )
                })
                .collect()
        })
    }

    /// Move every track forward to `target`, seeking where possible.
    pub fn seek_all(&mut self, target: &GenomeLocation) -> Result<()> {
        let result = self
            .tracks
            .iter_mut()
            .try_for_each(|track| track.seek_forward(target));
        if let Err(e) = result {
            self.close();
            return Err(e);
        }
        self.last_cursor = Some(target.clone());
        Ok(())
    }

    /// Scope every track to the contigs of one shard.
    pub fn set_contig_scope(&mut self, scope: ContigScope) {
        for track in &mut self.tracks {
            track.set_contig_scope(scope);
        }
    }

    /// Account for the rest of each track's scoped contigs once the last
    /// step has run. Any error closes every track.
    pub fn finish_scope(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self
            .tracks
            .iter_mut()
            .try_for_each(|track| track.finish_scope());
        if let Err(e) = result {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Per-track statistics in registration order.
    pub fn stats(&self) -> Vec<(String, TrackStats)> {
        self.tracks
            .iter()
            .map(|t| (t.name().to_string(), t.stats()))
            .collect()
    }

    /// Close every track. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for track in &mut self.tracks {
            track.close();
        }
        debug!(
            "Closed {} tracks after {} steps",
            self.tracks.len(),
            self.steps
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<P> Drop for TrackManager<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// What every track has at the current cursor.
///
/// Borrowed from the manager for the duration of one step.
pub struct RodView<'a, P = Payload> {
    cursor: &'a GenomeLocation,
    entries: Vec<(&'a str, Vec<&'a Feature<P>>)>,
    by_name: &'a FxHashMap<String, usize>,
}

impl<'a, P> RodView<'a, P> {
    pub fn cursor(&self) -> &GenomeLocation {
        self.cursor
    }

    /// Features of `track` overlapping the cursor. Unknown tracks yield an
    /// empty slice; use [`try_values`](Self::try_values) to tell them apart.
    pub fn values(&self, track: &str) -> &[&'a Feature<P>] {
        self.try_values(track).unwrap_or(&[])
    }

    pub fn try_values(&self, track: &str) -> Result<&[&'a Feature<P>]> {
        self.by_name
            .get(track)
            .and_then(|&i| self.entries.get(i))
            .map(|(_, features)| features.as_slice())
            .ok_or_else(|| RodError::UnknownTrack(track.to_string()))
    }

    pub fn first_value(&self, track: &str) -> Option<&'a Feature<P>> {
        self.values(track).first().copied()
    }

    pub fn has_values(&self, track: &str) -> bool {
        !self.values(track).is_empty()
    }

    /// Names of the tracks with at least one feature at the cursor.
    pub fn tracks_with_values(&self) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|(_, features)| !features.is_empty())
            .map(|(name, _)| *name)
            .collect()
    }

    /// `(track, features)` in registration order, including empty tracks.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &[&'a Feature<P>])> {
        self.entries
            .iter()
            .map(|(name, features)| (*name, features.as_slice()))
    }

    /// Every overlapping feature, track by track.
    pub fn all_values(&self) -> impl Iterator<Item = (&'a str, &'a Feature<P>)> + '_ {
        self.entries
            .iter()
            .flat_map(|(name, features)| features.iter().map(move |&f| (*name, f)))
    }

    /// True if no track has a feature at the cursor.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, features)| features.is_empty())
    }
}
