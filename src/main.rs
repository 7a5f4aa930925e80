//! rodwalk: reference-ordered data iteration
//!
//! Usage: rodwalk <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use rodwalk::config::{output_buffer_size, Codec, EngineConfig, ErrorPolicy, TrackConfig, DEFAULT_MAX_WINDOW};
use rodwalk::contig::ContigOrder;
use rodwalk::engine::Engine;
use rodwalk::error::{Result, RodError};
use rodwalk::index::{FeatureIndex, DEFAULT_STRIDE};
use rodwalk::output::RecordWriter;
use rodwalk::report::{OverlapReporter, ReportTotals};
use rodwalk::track::TrackStats;
use rodwalk::traversal::{read_loci, Traversal};

#[derive(Parser)]
#[command(name = "rodwalk")]
#[command(version)]
#[command(about = "rodwalk: stream sorted feature tracks in lockstep with a genomic traversal", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 'j', global = true)]
    threads: Option<usize>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the features of every track overlapping each cursor
    Overlaps {
        /// Contig dictionary (genome file or .dict)
        #[arg(short = 'g', long)]
        genome: PathBuf,

        /// Track: PATH or NAME=PATH[,codec=bed|loci][,index=FILE][,on-error=POLICY]
        #[arg(short = 't', long = "track", required = true)]
        tracks: Vec<TrackConfig>,

        /// Sorted cursor list (locus list or BED)
        #[arg(short = 'L', long)]
        loci: PathBuf,

        /// Codec for the cursor list (default: from the file extension)
        #[arg(long)]
        loci_codec: Option<Codec>,

        /// Visit every base of interval cursors separately
        #[arg(long)]
        by_locus: bool,

        /// Bases of lookahead past each cursor
        #[arg(long, default_value = "0")]
        padding: u64,

        /// Largest feature span (bp) a track window may hold
        #[arg(long, default_value_t = DEFAULT_MAX_WINDOW)]
        max_window: u64,

        /// Malformed-record policy: abort, skip-record or drop-track
        #[arg(long = "on-error", default_value = "abort")]
        on_error: ErrorPolicy,

        /// Seek indexed tracks across cursor gaps wider than this
        #[arg(long)]
        seek_gap: Option<u64>,

        /// Also print cursors with no overlapping features
        #[arg(long)]
        report_empty: bool,

        /// Use smaller I/O buffers
        #[arg(long)]
        low_memory: bool,

        /// Print per-track statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Stream every track end to end, checking decoding, order and spans
    Validate {
        /// Contig dictionary (genome file or .dict)
        #[arg(short = 'g', long)]
        genome: PathBuf,

        /// Track: PATH or NAME=PATH[,codec=bed|loci][,index=FILE][,on-error=POLICY]
        #[arg(short = 't', long = "track", required = true)]
        tracks: Vec<TrackConfig>,

        /// Largest feature span (bp) a track window may hold
        #[arg(long, default_value_t = DEFAULT_MAX_WINDOW)]
        max_window: u64,

        /// Malformed-record policy: abort, skip-record or drop-track
        #[arg(long = "on-error", default_value = "abort")]
        on_error: ErrorPolicy,
    },

    /// Build a block index for seekable access to a sorted file
    Index {
        /// Contig dictionary (genome file or .dict)
        #[arg(short = 'g', long)]
        genome: PathBuf,

        /// Sorted input file
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// Index file (default: <input>.ridx)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Input codec (default: from the file extension)
        #[arg(long)]
        codec: Option<Codec>,

        /// Records per index block
        #[arg(long, default_value_t = DEFAULT_STRIDE)]
        stride: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // A logger installed by an embedding process wins
    let _ = builder.try_init();
}

fn run(cli: Cli) -> Result<()> {
    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| RodError::Config(format!("thread pool: {}", e)))?;
    }

    match cli.command {
        Commands::Overlaps {
            genome,
            tracks,
            loci,
            loci_codec,
            by_locus,
            padding,
            max_window,
            on_error,
            seek_gap,
            report_empty,
            low_memory,
            stats,
        } => {
            let config = EngineConfig::new()
                .with_padding(padding)
                .with_max_window(max_window)
                .with_error_policy(on_error)
                .with_low_memory(low_memory);
            let traversal = Traversal::new()
                .with_by_locus(by_locus)
                .with_seek_gap(seek_gap);
            run_overlaps(
                genome,
                tracks,
                loci,
                loci_codec,
                config,
                traversal,
                report_empty,
                low_memory,
                stats,
            )
        }

        Commands::Validate {
            genome,
            tracks,
            max_window,
            on_error,
        } => {
            let config = EngineConfig::new()
                .with_max_window(max_window)
                .with_error_policy(on_error);
            run_validate(genome, tracks, config)
        }

        Commands::Index {
            genome,
            input,
            output,
            codec,
            stride,
        } => run_index(genome, input, output, codec, stride),
    }
}

fn run_overlaps(
    genome: PathBuf,
    tracks: Vec<TrackConfig>,
    loci: PathBuf,
    loci_codec: Option<Codec>,
    config: EngineConfig,
    traversal: Traversal,
    report_empty: bool,
    low_memory: bool,
    stats: bool,
) -> Result<()> {
    let contigs = Arc::new(ContigOrder::from_file(&genome)?);
    let engine = Engine::new(contigs.clone(), config, tracks)?;

    let codec = loci_codec.unwrap_or_else(|| Codec::from_path(&loci));
    let steps = read_loci(&loci, codec, contigs)?;

    let buffer = output_buffer_size(low_memory);
    let outputs = engine.run_sharded(&traversal, steps, |_| {
        OverlapReporter::new(RecordWriter::with_capacity(buffer, Vec::new()))
            .with_report_empty(report_empty)
    })?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let mut totals = ReportTotals::default();
    let mut merged: Vec<(String, TrackStats)> = Vec::new();

    for output in outputs {
        totals.merge(&output.sum);
        for (name, track_stats) in &output.stats {
            match merged.iter_mut().find(|(n, _)| n == name) {
                Some((_, acc)) => acc.merge(track_stats),
                None => merged.push((name.clone(), track_stats.clone())),
            }
        }
        handle.write_all(&output.walker.into_inner()?)?;
    }
    handle.flush()?;

    info!("{}", totals);
    if stats {
        eprintln!("Overlaps stats: {}", totals);
        for (name, track_stats) in &merged {
            eprintln!("Track {}: {}", name, track_stats);
        }
    }
    Ok(())
}

fn run_validate(genome: PathBuf, tracks: Vec<TrackConfig>, config: EngineConfig) -> Result<()> {
    let contigs = Arc::new(ContigOrder::from_file(&genome)?);
    let engine = Engine::new(contigs, config, tracks)?;
    let report = engine.validate()?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for (name, source_stats) in report {
        writeln!(
            handle,
            "{}\tOK\t{}\t{}",
            name, source_stats.records, source_stats.skipped
        )?;
    }
    Ok(())
}

fn run_index(
    genome: PathBuf,
    input: PathBuf,
    output: Option<PathBuf>,
    codec: Option<Codec>,
    stride: usize,
) -> Result<()> {
    let contigs = Arc::new(ContigOrder::from_file(&genome)?);
    let codec = codec.unwrap_or_else(|| Codec::from_path(&input));
    let index = FeatureIndex::build(&input, codec.decoder(), contigs, stride)?;

    let output = output.unwrap_or_else(|| FeatureIndex::default_path(&input));
    index.write(&output)?;
    info!(
        "Wrote {} ({} blocks, stride {})",
        output.display(),
        index.block_count(),
        index.stride()
    );
    Ok(())
}
