//! Demand pager - command line driver
//!
//! Usage:
//!   demand-pager run   [OPTIONS]                         seeded self-checking run
//!   demand-pager trace [OPTIONS] <image> <trace>         replay an access trace
//!
//! Geometry options (both commands):
//!   --page-bits <B>    page size = 2^B bytes (default 12)
//!   --pages <P>        virtual pages (default 1024)
//!   --frames <F>       physical frames (default 16)
//!   -v, --verbose      repeat for debug / trace output

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::info;

use demand_pager::constants::{FRAME_COUNT, PAGE_BITS, TOTAL_PAGES};
use demand_pager::harness::{Harness, HarnessConfig};
use demand_pager::io::{self, TraceOp};
use demand_pager::{PagerConfig, VmManager, logging};

#[derive(Parser)]
#[command(name = "demand-pager", about = "Demand-paged virtual memory simulator with LRU replacement")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed a random store and verify reads and writes against a shadow copy
    Run(RunArgs),
    /// Replay a trace file against a backing-store image
    Trace(TraceArgs),
}

#[derive(Args)]
struct Geometry {
    #[arg(long, default_value_t = PAGE_BITS)]
    page_bits: u32,
    #[arg(long = "pages", default_value_t = TOTAL_PAGES)]
    total_pages: usize,
    #[arg(long = "frames", default_value_t = FRAME_COUNT)]
    frame_count: usize,
}

impl Geometry {
    fn config(&self) -> Result<PagerConfig> {
        PagerConfig::new(self.page_bits, self.total_pages, self.frame_count).context("invalid geometry")
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    geometry: Geometry,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long, default_value_t = 1001)]
    reads: usize,
    #[arg(long, default_value_t = 101)]
    writes: usize,
    #[arg(long, default_value_t = 17)]
    verify: usize,
    #[arg(long, default_value_t = 2501)]
    dense: usize,
    /// Check page table / LRU invariants after every access
    #[arg(long)]
    check: bool,
}

#[derive(Args)]
struct TraceArgs {
    #[command(flatten)]
    geometry: Geometry,
    /// Backing-store image, exactly pages * page size bytes
    image: PathBuf,
    /// Trace of `r <addr>` / `w <addr> <value>` lines
    trace: PathBuf,
    /// Write read results here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write the flushed backing store here afterwards
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run_harness(&args),
        Command::Trace(args) => run_trace(&args),
    }
}

fn run_harness(args: &RunArgs) -> Result<()> {
    let config = args.geometry.config()?;
    let hc = HarnessConfig {
        seed: args.seed,
        reads: args.reads,
        writes: args.writes,
        verify_reads: args.verify,
        dense_reads: args.dense,
        check: args.check,
        ..HarnessConfig::default()
    };
    info!("running harness with seed {}", hc.seed);

    let report = Harness::run(config, &hc).context("harness run failed")?;
    println!("ok: {}", report.stats);
    Ok(())
}

fn run_trace(args: &TraceArgs) -> Result<()> {
    let config = args.geometry.config()?;
    let image = io::read_image(&args.image, config.store_size()).map_err(anyhow::Error::msg)?;
    let ops = io::read_trace(&args.trace).map_err(anyhow::Error::msg)?;
    if ops.is_empty() {
        bail!("trace {} contains no accesses", args.trace.display());
    }
    info!("replaying {} accesses from {}", ops.len(), args.trace.display());

    let mut vm = VmManager::from_bytes(config, image)?;
    let mut results = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        match *op {
            TraceOp::Read(va) => {
                let value = vm.get_byte(va).with_context(|| format!("access {}: read {}", i, va))?;
                results.push(value);
            }
            TraceOp::Write(va, value) => {
                vm.set_byte(va, value).with_context(|| format!("access {}: write {}", i, va))?;
            }
        }
    }
    info!("{}", vm.stats());

    match &args.output {
        Some(path) => io::write_results(path, &results).map_err(anyhow::Error::msg)?,
        None => print!("{}", io::format_results(&results)),
    }

    if let Some(path) = &args.dump {
        let store = vm.into_backing_store()?;
        io::write_image(path, &store.into_bytes()).map_err(anyhow::Error::msg)?;
    }
    Ok(())
}
