use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pangenome_blocks::io::{self, SnapshotMeta};
use pangenome_blocks::model::BlockSet;
use pangenome_blocks::pipeline::{Pipeline, StepRegistry};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const DEFAULT_STEPS: &str = "find-anchors,resolve,expand,resolve,join,rest,check-no-overlaps";

#[derive(Parser, Debug)]
#[command(
    name = "pangenome-blocks",
    author,
    version,
    about = "Repeat finder and overlap-free pangenome blocks",
    arg_required_else_help = true
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a pipeline of steps over the sequences of a FASTA file
    Run {
        /// Input FASTA file
        fasta: String,
        /// Comma separated step names
        #[arg(short, long, default_value = DEFAULT_STEPS)]
        steps: String,
        /// Parameter assignment `step.param=value` or `param=value` (repeatable)
        #[arg(long = "set")]
        set: Vec<String>,
        /// Start from the blocks in this file instead of an empty set
        #[arg(short, long)]
        blocks: Option<String>,
        /// Output blocks file (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        /// Also save a binary snapshot of the result
        #[arg(long)]
        snapshot: Option<String>,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
    },
    /// Verify that a blocks file is overlap-free
    Check {
        fasta: String,
        blocks: String,
    },
    /// Print block, fragment and coverage counts of a blocks file
    Stats {
        fasta: String,
        blocks: String,
    },
    /// List the registered steps and their parameters
    Steps,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    match cli.command {
        Commands::Run { fasta, steps, set, blocks, out, snapshot, threads } => {
            run_pipeline(&fasta, &steps, &set, blocks.as_deref(), out.as_deref(), snapshot.as_deref(), threads)
        }
        Commands::Check { fasta, blocks } => run_check(&fasta, &blocks),
        Commands::Stats { fasta, blocks } => run_stats(&fasta, &blocks),
        Commands::Steps => list_steps(),
    }
}

fn load(fasta: &str, blocks: Option<&str>) -> Result<BlockSet> {
    let mut bs = BlockSet::with_sequences(io::read_sequences_from_file(fasta)?);
    if let Some(path) = blocks {
        io::read_blocks_from_file(path, &mut bs)?;
    }
    Ok(bs)
}

fn run_pipeline(
    fasta: &str,
    steps: &str,
    set: &[String],
    blocks: Option<&str>,
    out: Option<&str>,
    snapshot: Option<&str>,
    threads: usize,
) -> Result<()> {
    let registry = StepRegistry::new();
    let mut pipeline = Pipeline::parse(&registry, steps)?;
    pipeline.set_workers(threads)?;
    for assignment in set {
        pipeline.set(assignment).with_context(|| format!("--set {}", assignment))?;
    }
    pipeline.validate()?;

    let mut bs = load(fasta, blocks)?;
    pipeline.run(&mut bs)?;

    match out {
        Some(path) => io::write_blocks_to_file(&bs, path)?,
        None => {
            let stdout = std::io::stdout();
            let mut w = std::io::BufWriter::new(stdout.lock());
            io::write_blocks(&bs, &mut w)?;
            w.flush()?;
        }
    }
    if let Some(path) = snapshot {
        io::snapshot::save_to_file(&bs, SnapshotMeta::now(Some(fasta.to_string())), path)?;
        log::info!("snapshot saved: {}", path);
    }
    Ok(())
}

fn run_check(fasta: &str, blocks: &str) -> Result<()> {
    let mut bs = load(fasta, Some(blocks))?;
    let registry = StepRegistry::new();
    registry.create("check-no-overlaps")?.run(&mut bs).with_context(|| format!("'{}' is not overlap-free", blocks))?;
    println!("{}: {} blocks, no overlaps", blocks, bs.block_count());
    Ok(())
}

fn run_stats(fasta: &str, blocks: &str) -> Result<()> {
    let bs = load(fasta, Some(blocks))?;
    let total: usize = bs.sequences().iter().map(|s| s.len()).sum();
    let covered: usize = bs.coverage().iter().map(|c| c.count_ones()).sum();
    let sizes: Vec<usize> = bs.block_ids().into_iter().map(|b| bs.block(b).len()).collect();
    println!("sequences: {}", bs.sequences().len());
    println!("total_len: {}", total);
    println!("blocks: {}", bs.block_count());
    println!("repeat_blocks: {}", sizes.iter().filter(|&&n| n >= 2).count());
    println!("largest_block: {}", sizes.iter().max().copied().unwrap_or(0));
    println!("fragments: {}", bs.fragment_count());
    println!("covered: {}", covered);
    println!("uncovered: {}", total - covered);
    println!("multiply_covered: {}", bs.multiply_covered());
    Ok(())
}

fn list_steps() -> Result<()> {
    let registry = StepRegistry::new();
    for name in registry.names() {
        let step = registry.create(name)?;
        let params: Vec<String> = step.params().into_iter().map(|(p, v)| format!("{}={}", p, v)).collect();
        println!("{}\t{}", name, params.join(" "));
    }
    Ok(())
}
