//! End-to-end traversal scenarios.
//!
//! These tests drive the engine over on-disk BED tracks and compare the
//! per-step overlap sets against brute-force answers.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use rodwalk::error::RecordPos;
use rodwalk::manager::RodView;
use rodwalk::track::TrackStats;
use rodwalk::prelude::*;

fn contigs() -> Arc<ContigOrder> {
    Arc::new(ContigOrder::from_pairs([("chr1", 10_000), ("chr2", 5_000)]).unwrap())
}

fn bed_file(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

fn bed_lines(spans: &[(&str, u64, u64)]) -> Vec<String> {
    spans
        .iter()
        .map(|(c, s, e)| format!("{}\t{}\t{}", c, s, e))
        .collect()
}

fn loci(contigs: &ContigOrder, cursors: &[(&str, u64, u64)]) -> Vec<TraversalStep> {
    cursors
        .iter()
        .map(|&(c, s, e)| TraversalStep::Locus(contigs.location(c, s, e).unwrap()))
        .collect()
}

/// Overlaps per step: `(track, start, stop)` in view order.
#[derive(Default)]
struct Collect;

impl Walker for Collect {
    type Value = Vec<(String, u64, u64)>;
    type Sum = Vec<Vec<(String, u64, u64)>>;

    fn reduce_init(&mut self) -> Self::Sum {
        Vec::new()
    }

    fn map(
        &mut self,
        _step: &TraversalStep,
        _cursor: &GenomeLocation,
        view: &RodView<'_>,
    ) -> Result<Self::Value> {
        Ok(view
            .all_values()
            .map(|(track, f)| (track.to_string(), f.start(), f.stop()))
            .collect())
    }

    fn reduce(&mut self, value: Self::Value, mut sum: Self::Sum) -> Self::Sum {
        sum.push(value);
        sum
    }
}

fn spans_of(step: &[(String, u64, u64)]) -> Vec<(u64, u64)> {
    step.iter().map(|(_, s, e)| (*s, *e)).collect()
}

#[test]
fn test_three_cursor_scenario() {
    // 1-based (10,20), (15,25), (30,40)
    let track_a = bed_file(&bed_lines(&[("chr1", 9, 20), ("chr1", 14, 25), ("chr1", 29, 40)]));
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![TrackConfig::new("A", track_a.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 12, 12), ("chr1", 22, 22), ("chr1", 35, 35)]);
    let (sum, stats) = engine.run(&Traversal::new(), steps, &mut Collect).unwrap();

    assert_eq!(spans_of(&sum[0]), vec![(10, 20)]);
    assert_eq!(spans_of(&sum[1]), vec![(15, 25)]);
    assert_eq!(spans_of(&sum[2]), vec![(30, 40)]);

    let a = &stats[0].1;
    assert_eq!(a.read, 3);
    assert_eq!(a.evicted, 2);
}

#[test]
fn test_unsorted_track_names_second_record() {
    let track_a = bed_file(&bed_lines(&[("chr1", 49, 60), ("chr1", 39, 45)]));
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![TrackConfig::new("A", track_a.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 55, 55), ("chr1", 100, 100)]);
    let err = engine
        .run(&Traversal::new(), steps, &mut Collect)
        .unwrap_err();
    match err {
        RodError::UnsortedInput {
            track, record, at, ..
        } => {
            assert_eq!(track, "A");
            assert_eq!(record, 2);
            assert_eq!(at, RecordPos::Line(2));
        }
        other => panic!("expected UnsortedInput, got {other}"),
    }
}

#[test]
fn test_unsorted_is_fatal_even_when_skipping() {
    let track_a = bed_file(&bed_lines(&[("chr1", 49, 60), ("chr1", 39, 45)]));
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default().with_error_policy(ErrorPolicy::SkipRecord),
        vec![TrackConfig::new("A", track_a.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 100, 100)]);
    assert!(matches!(
        engine.run(&Traversal::new(), steps, &mut Collect),
        Err(RodError::UnsortedInput { .. })
    ));
}

#[test]
fn test_skip_record_policy() {
    let lines = vec![
        "chr1\t9\t20".to_string(),
        "chr1\tnot-a-number\t30".to_string(),
        "chr1\t39\t50".to_string(),
    ];
    let track_a = bed_file(&lines);
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![TrackConfig::new("A", track_a.path())
            .with_codec(Codec::Bed)
            .with_error_policy(ErrorPolicy::SkipRecord)],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 12, 12), ("chr1", 45, 45)]);
    let (sum, stats) = engine.run(&Traversal::new(), steps, &mut Collect).unwrap();
    assert_eq!(spans_of(&sum[0]), vec![(10, 20)]);
    assert_eq!(spans_of(&sum[1]), vec![(40, 50)]);
    assert_eq!(stats[0].1.skipped, 1);
}

#[test]
fn test_malformed_record_aborts_by_default() {
    let lines = vec!["chr1\t9\t20".to_string(), "chr1\t30\t20".to_string()];
    let track_a = bed_file(&lines);
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![TrackConfig::new("A", track_a.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 12, 12), ("chr1", 45, 45)]);
    match engine.run(&Traversal::new(), steps, &mut Collect) {
        Err(RodError::MalformedFeature { track, at, .. }) => {
            assert_eq!(track, "A");
            assert_eq!(at, RecordPos::Line(2));
        }
        other => panic!("expected MalformedFeature, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_drop_track_policy_keeps_other_tracks() {
    let bad = bed_file(&[
        "chr1\t9\t20".to_string(),
        "chr1\tzz\t30".to_string(),
        "chr1\t39\t50".to_string(),
    ]);
    let good = bed_file(&bed_lines(&[("chr1", 9, 20), ("chr1", 39, 50)]));
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![
            TrackConfig::new("bad", bad.path())
                .with_codec(Codec::Bed)
                .with_error_policy(ErrorPolicy::DropTrack),
            TrackConfig::new("good", good.path()).with_codec(Codec::Bed),
        ],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 12, 12), ("chr1", 45, 45)]);
    let (sum, stats) = engine.run(&Traversal::new(), steps, &mut Collect).unwrap();

    // What the bad track admitted before the malformed line is still reported
    assert_eq!(
        sum[0],
        vec![
            ("bad".to_string(), 10, 20),
            ("good".to_string(), 10, 20),
        ]
    );
    assert_eq!(sum[1], vec![("good".to_string(), 40, 50)]);

    assert!(stats[0].1.dropped);
    assert!(!stats[1].1.dropped);
}

#[test]
fn test_dropped_track_answer_does_not_depend_on_lookahead() {
    let c = contigs();
    let run = |lines: &[&str]| {
        let file = bed_file(&lines.iter().map(|l| l.to_string()).collect::<Vec<_>>());
        let engine = Engine::new(
            c.clone(),
            EngineConfig::default(),
            vec![TrackConfig::new("bad", file.path())
                .with_codec(Codec::Bed)
                .with_error_policy(ErrorPolicy::DropTrack)],
        )
        .unwrap();
        let steps = loci(&c, &[("chr1", 12, 12)]);
        let (sum, _) = engine.run(&Traversal::new(), steps, &mut Collect).unwrap();
        sum.iter().map(|step| spans_of(step)).collect::<Vec<_>>()
    };

    // Malformed line right after the overlapping feature, or one feature later
    let near = run(&["chr1\t9\t20", "chr1\tzz\t30"]);
    let far = run(&["chr1\t9\t20", "chr1\t99\t200", "chr1\tzz\t300"]);
    assert_eq!(near, vec![vec![(10, 20)]]);
    assert_eq!(far, near);
}

#[test]
fn test_window_overflow_is_reported() {
    let wide = bed_file(&bed_lines(&[("chr1", 0, 5_000)]));
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default().with_max_window(1_000),
        vec![TrackConfig::new("wide", wide.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let steps = loci(&c, &[("chr1", 10, 10)]);
    assert!(matches!(
        engine.run(&Traversal::new(), steps, &mut Collect),
        Err(RodError::WindowOverflow { span: 5_000, limit: 1_000, .. })
    ));
}

#[test]
fn test_padding_prefetches_without_reporting() {
    let track_a = bed_file(&bed_lines(&[("chr1", 9, 20), ("chr1", 59, 70)]));
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default().with_padding(100),
        vec![TrackConfig::new("A", track_a.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let mut manager = engine.open_manager().unwrap();
    let cursor = c.locus("chr1", 12).unwrap();
    let hits = manager.overlaps(&cursor).unwrap();
    assert_eq!(hits[0].1.len(), 1);
    assert_eq!(manager.track("A").unwrap().buffered(), 2);
}

fn random_features(rng: &mut SmallRng, c: &ContigOrder, n: usize) -> Vec<(String, u64, u64)> {
    let mut spans: Vec<(u32, u64, u64)> = (0..n)
        .map(|_| {
            let rank = rng.gen_range(0..2u32);
            let len = c.length(rank).unwrap();
            let start = rng.gen_range(1..len - 200);
            let stop = start + rng.gen_range(0..200);
            (rank, start, stop)
        })
        .collect();
    spans.sort();
    spans
        .into_iter()
        .map(|(rank, s, e)| (c.name(rank).unwrap().to_string(), s, e))
        .collect()
}

fn random_cursors(rng: &mut SmallRng, c: &ContigOrder, n: usize) -> Vec<(String, u64, u64)> {
    let mut starts: Vec<(u32, u64)> = (0..n)
        .map(|_| {
            let rank = rng.gen_range(0..2u32);
            let len = c.length(rank).unwrap();
            (rank, rng.gen_range(1..len - 100))
        })
        .collect();
    starts.sort();
    starts
        .into_iter()
        .map(|(rank, s)| (c.name(rank).unwrap().to_string(), s, s + rng.gen_range(0..100)))
        .collect()
}

fn brute_force(features: &[(String, u64, u64)], cursor: &(String, u64, u64)) -> Vec<(u64, u64)> {
    let mut hits: Vec<(u64, u64)> = features
        .iter()
        .filter(|(c, s, e)| *c == cursor.0 && *s <= cursor.2 && *e >= cursor.1)
        .map(|(_, s, e)| (*s, *e))
        .collect();
    hits.sort();
    hits
}

#[test]
fn test_random_traversals_match_brute_force() {
    let c = contigs();
    for seed in 0..20u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let features = random_features(&mut rng, &c, 300);
        let cursors = random_cursors(&mut rng, &c, 200);

        let memory = features
            .iter()
            .map(|(name, s, e)| Feature::new(c.location(name, *s, *e).unwrap(), Payload::Interval));
        let mut manager = TrackManager::new();
        manager
            .add_track(
                RodTrack::new(Box::new(MemorySource::new("r", memory)), 1_000)
                    .with_padding(rng.gen_range(0..50)),
            )
            .unwrap();

        for cursor in &cursors {
            let loc = c.location(&cursor.0, cursor.1, cursor.2).unwrap();
            let hits = manager.overlaps(&loc).unwrap();
            let mut got: Vec<(u64, u64)> = hits[0].1.iter().map(|f| (f.start(), f.stop())).collect();
            got.sort();
            assert_eq!(got, brute_force(&features, cursor), "seed {seed} cursor {loc}");
        }
        assert!(manager.stats()[0].1.peak_window <= features.len());
        manager.close();
    }
}

#[test]
fn test_sharded_stats_match_sequential() {
    let file = bed_file(&[
        "chr1\t0\t10".to_string(),
        "chr1\t99\t120".to_string(),
        "chr1\t199\t220".to_string(),
        "chr1\tbad\t5".to_string(),
        "chr2\t0\t10".to_string(),
    ]);
    let c = contigs();
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![TrackConfig::new("r", file.path())
            .with_codec(Codec::Bed)
            .with_error_policy(ErrorPolicy::SkipRecord)],
    )
    .unwrap();
    let steps = loci(&c, &[("chr1", 5, 5), ("chr2", 5, 5)]);

    let (_, sequential) = engine
        .run(&Traversal::new(), steps.clone(), &mut Collect)
        .unwrap();
    let outputs = engine
        .run_sharded(&Traversal::new(), steps, |_| Collect)
        .unwrap();
    assert_eq!(outputs.len(), 2);
    let mut merged = TrackStats::default();
    for output in &outputs {
        merged.merge(&output.stats[0].1);
    }

    let expected = &sequential[0].1;
    assert_eq!(expected.read, 4);
    assert_eq!(expected.skipped, 1);
    assert_eq!(expected.admitted, 2);
    assert_eq!(expected.discarded, 2);
    assert_eq!(expected.evicted, 1);
    // Peak window is a per-shard maximum
    assert_eq!(
        TrackStats {
            peak_window: 0,
            ..merged
        },
        TrackStats {
            peak_window: 0,
            ..expected.clone()
        }
    );
}

#[test]
fn test_sharded_run_matches_sequential() {
    let c = contigs();
    let mut rng = SmallRng::seed_from_u64(7);
    let features = random_features(&mut rng, &c, 400);
    let cursors = random_cursors(&mut rng, &c, 150);

    let lines: Vec<String> = features
        .iter()
        .map(|(name, s, e)| format!("{}\t{}\t{}", name, s - 1, e))
        .collect();
    let file = bed_file(&lines);
    let engine = Engine::new(
        c.clone(),
        EngineConfig::default(),
        vec![TrackConfig::new("r", file.path()).with_codec(Codec::Bed)],
    )
    .unwrap();

    let steps: Vec<TraversalStep> = cursors
        .iter()
        .map(|(name, s, e)| TraversalStep::Locus(c.location(name, *s, *e).unwrap()))
        .collect();

    let (sequential, _) = engine
        .run(&Traversal::new(), steps.clone(), &mut Collect)
        .unwrap();
    let sharded: Vec<Vec<(String, u64, u64)>> = engine
        .run_sharded(&Traversal::new(), steps, |_| Collect)
        .unwrap()
        .into_iter()
        .flat_map(|output| output.sum)
        .collect();

    assert_eq!(sequential.len(), cursors.len());
    assert_eq!(sharded, sequential);
    for (step, cursor) in sequential.iter().zip(&cursors) {
        let mut got = spans_of(step);
        got.sort();
        assert_eq!(got, brute_force(&features, cursor));
    }
}
