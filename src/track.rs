//! A named track: one feature source plus its sliding window.

use crate::config::ErrorPolicy;
use crate::error::{Result, RodError};
use crate::feature::{Feature, Payload};
use crate::location::GenomeLocation;
use crate::source::FeatureSource;
use crate::window::{WindowBuffer, WindowState};
use log::{debug, trace, warn};

/// Statistics from driving one track.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackStats {
    /// Features pulled from the source.
    pub read: usize,
    /// Malformed records the source skipped.
    pub skipped: usize,
    /// Features admitted to the window.
    pub admitted: usize,
    /// Features found entirely behind the cursor and never admitted.
    pub discarded: usize,
    pub evicted: usize,
    pub peak_window: usize,
    pub seeks: usize,
    /// Whether the track was dropped after a malformed record.
    pub dropped: bool,
}

impl TrackStats {
    /// Fold in the counters of another run of the same track (another shard).
    pub fn merge(&mut self, other: &TrackStats) {
        self.read += other.read;
        self.skipped += other.skipped;
        self.admitted += other.admitted;
        self.discarded += other.discarded;
        self.evicted += other.evicted;
        self.peak_window = self.peak_window.max(other.peak_window);
        self.seeks += other.seeks;
        self.dropped |= other.dropped;
    }
}

impl std::fmt::Display for TrackStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Skipped: {}, Admitted: {}, Discarded: {}, Evicted: {}, Peak window: {}, Seeks: {}{}",
            self.read,
            self.skipped,
            self.admitted,
            self.discarded,
            self.evicted,
            self.peak_window,
            self.seeks,
            if self.dropped { ", DROPPED" } else { "" }
        )
    }
}

/// Contigs a track is responsible for when a traversal is split by contig.
///
/// Features ranked below `first` belong to an earlier shard and are passed
/// over without being counted. Features ranked at or past `next` belong to a
/// later shard and are never counted as read here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContigScope {
    pub first: Option<u32>,
    pub next: Option<u32>,
}

impl ContigScope {
    #[inline]
    fn owns(&self, rank: u32) -> bool {
        self.next.is_none_or(|next| rank < next)
    }
}

/// Position-aware iteration over one source.
///
/// The cursor passed to [`advance_to`](Self::advance_to) must never move
/// backwards (by contig rank, then start).
pub struct RodTrack<P = Payload> {
    name: String,
    source: Box<dyn FeatureSource<P>>,
    buffer: WindowBuffer<P>,
    /// First feature pulled past the fill bound, held for the next advance.
    lookahead: Option<Feature<P>>,
    padding: u64,
    policy: ErrorPolicy,
    last_cursor: Option<GenomeLocation>,
    /// Extent covered by the last fill: `[cursor.start, cursor.stop + padding]`.
    filled: Option<GenomeLocation>,
    source_done: bool,
    dropped: bool,
    closed: bool,
    scope: ContigScope,
    /// Still passing over features of earlier shards.
    in_prefix: bool,
    stats: TrackStats,
}

impl<P> RodTrack<P> {
    pub fn new(source: Box<dyn FeatureSource<P>>, max_window: u64) -> Self {
        let name = source.name().to_string();
        Self {
            buffer: WindowBuffer::new(name.clone(), max_window),
            name,
            source,
            lookahead: None,
            padding: 0,
            policy: ErrorPolicy::Abort,
            last_cursor: None,
            filled: None,
            source_done: false,
            dropped: false,
            closed: false,
            scope: ContigScope::default(),
            in_prefix: false,
            stats: TrackStats::default(),
        }
    }

    /// Set lookahead padding past the cursor stop (builder pattern).
    pub fn with_padding(mut self, padding: u64) -> Self {
        self.padding = padding;
        self
    }

    /// Set the policy for malformed records (builder pattern).
    ///
    /// Only [`ErrorPolicy::DropTrack`] is handled here; skipping happens in
    /// the source.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Restrict counting to the contigs of one shard (builder pattern).
    pub fn with_contig_scope(mut self, scope: ContigScope) -> Self {
        self.set_contig_scope(scope);
        self
    }

    /// Restrict counting to the contigs of one shard.
    ///
    /// Must be called before the first feature is pulled.
    pub fn set_contig_scope(&mut self, scope: ContigScope) {
        self.scope = scope;
        self.in_prefix = scope.first.is_some();
        self.source.set_silent(self.in_prefix);
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window_state(&self) -> WindowState {
        self.buffer.state()
    }

    /// Features currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    /// Nothing buffered and nothing left to read.
    pub fn is_exhausted(&self) -> bool {
        self.source_done && self.lookahead.is_none() && self.buffer.is_empty()
    }

    /// Pull features until the source is exhausted or the next one starts
    /// past `cursor.stop + padding` (or on a later contig).
    ///
    /// Features entirely behind the cursor are discarded without being
    /// admitted.
    pub fn advance_to(&mut self, cursor: &GenomeLocation) -> Result<()> {
        self.check_monotonic(cursor)?;
        self.buffer.begin_fill();

        let bound = cursor.stop().saturating_add(self.padding);
        loop {
            let next = match self.lookahead.take() {
                Some(feature) => feature,
                None => match self.pull()? {
                    Some(feature) => feature,
                    None => break,
                },
            };

            let loc = next.location();
            if loc.rank() > cursor.rank() || (loc.rank() == cursor.rank() && loc.start() > bound) {
                self.lookahead = Some(next);
                break;
            }
            if loc.is_before(cursor) {
                self.stats.discarded += 1;
                continue;
            }
            self.buffer.admit(next)?;
            self.stats.admitted += 1;
        }

        self.buffer
            .settle(self.source_done && self.lookahead.is_none());
        self.filled = Some(cursor.with_bounds(cursor.start(), bound));
        self.last_cursor = Some(cursor.clone());
        trace!(
            "Track '{}': advanced to {} ({} buffered)",
            self.name,
            cursor,
            self.buffer.len()
        );
        Ok(())
    }

    /// Buffered features overlapping `cursor`, ascending by start then stop.
    ///
    /// Does not evict. Fails with `WindowNotFilled` when `cursor` reaches
    /// outside the extent filled by the last [`advance_to`](Self::advance_to).
    pub fn features_overlapping(&self, cursor: &GenomeLocation) -> Result<Vec<&Feature<P>>> {
        match &self.filled {
            Some(filled) if filled.contains(cursor) => {
                Ok(self.buffer.peek_overlap(cursor).collect())
            }
            filled => Err(RodError::WindowNotFilled {
                track: self.name.clone(),
                cursor: cursor.to_string(),
                filled: filled
                    .as_ref()
                    .map_or_else(|| "nothing".to_string(), |f| f.to_string()),
            }),
        }
    }

    /// Remove every buffered feature entirely behind `cursor`.
    pub fn evict_before(&mut self, cursor: &GenomeLocation) -> usize {
        let evicted = self.buffer.evict(cursor);
        self.stats.evicted += evicted;
        evicted
    }

    /// Jump to `target`, which must not be behind the last cursor.
    ///
    /// When nothing buffered can reach `target` and the source supports it,
    /// the source is repositioned instead of streamed through. The track is
    /// then filled for `target` as by [`advance_to`](Self::advance_to).
    pub fn seek_forward(&mut self, target: &GenomeLocation) -> Result<()> {
        self.check_monotonic(target)?;
        self.evict_before(target);

        let lookahead_behind = self
            .lookahead
            .as_ref()
            .is_none_or(|f| f.location().is_before(target));
        if self.buffer.is_empty()
            && lookahead_behind
            && !self.source_done
            && self.source.can_seek()
        {
            debug!("Track '{}': seeking to {}", self.name, target);
            self.lookahead = None;
            self.source.seek_to(target)?;
            self.stats.seeks += 1;
        }

        self.advance_to(target)
    }

    /// Account for everything left on the contigs this track is scoped to.
    ///
    /// Buffered features count as evicted, and every remaining feature
    /// ranked before `scope.next` is read and counted as discarded. The
    /// first feature of the next shard is held back uncounted. Does nothing
    /// without a `next` bound.
    pub fn finish_scope(&mut self) -> Result<()> {
        let Some(next) = self.scope.next else {
            return Ok(());
        };
        if self.closed {
            return Ok(());
        }
        self.stats.evicted += self.buffer.len();
        self.buffer.clear();

        if let Some(feature) = self.lookahead.take() {
            if feature.location().rank() >= next {
                self.lookahead = Some(feature);
                return Ok(());
            }
            self.stats.discarded += 1;
        }
        while let Some(feature) = self.pull()? {
            if feature.location().rank() >= next {
                self.lookahead = Some(feature);
                break;
            }
            self.stats.discarded += 1;
        }
        trace!("Track '{}': finished scope before rank {}", self.name, next);
        Ok(())
    }

    /// Location of the next feature not yet admitted, if any.
    pub fn peek_next_location(&mut self) -> Result<Option<&GenomeLocation>> {
        if self.lookahead.is_none() {
            self.lookahead = self.pull()?;
        }
        Ok(self.lookahead.as_ref().map(|f| f.location()))
    }

    /// Release the source and drop all buffered state. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
        self.source_done = true;
        self.lookahead = None;
        self.buffer.clear();
        debug!("Track '{}' closed: {}", self.name, self.stats());
    }

    pub fn stats(&self) -> TrackStats {
        TrackStats {
            skipped: self.source.stats().skipped,
            peak_window: self.buffer.peak(),
            dropped: self.dropped,
            ..self.stats.clone()
        }
    }

    fn check_monotonic(&self, cursor: &GenomeLocation) -> Result<()> {
        if let Some(last) = &self.last_cursor {
            if cursor.starts_before(last) {
                return Err(RodError::NonMonotonicCursor {
                    track: self.name.clone(),
                    previous: last.to_string(),
                    current: cursor.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Next feature from the source, applying the drop-track policy and the
    /// contig scope.
    ///
    /// A dropped track keeps what it already admitted; those features are
    /// evicted as the cursor passes them.
    fn pull(&mut self) -> Result<Option<Feature<P>>> {
        loop {
            if self.source_done {
                return Ok(None);
            }
            match self.source.next_feature() {
                Ok(Some(feature)) => {
                    let rank = feature.location().rank();
                    if self.in_prefix {
                        if self.scope.first.is_some_and(|first| rank < first) {
                            continue;
                        }
                        self.in_prefix = false;
                        self.source.set_silent(false);
                    }
                    if self.scope.owns(rank) {
                        self.stats.read += 1;
                    }
                    return Ok(Some(feature));
                }
                Ok(None) => {
                    debug!("Track '{}' reached end of input", self.name);
                    self.source_done = true;
                    return Ok(None);
                }
                Err(e) if e.is_record_error() && self.policy == ErrorPolicy::DropTrack => {
                    if self.in_prefix {
                        debug!("Dropping track '{}' before its contigs: {}", self.name, e);
                    } else {
                        warn!("Dropping track '{}': {}", self.name, e);
                    }
                    self.dropped = true;
                    self.source_done = true;
                    self.lookahead = None;
                    self.source.close();
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
