//! focalraw CLI - Command-line interface for FOCAL raw data.
//!
//! Decodes raw page files cycle by cycle and prints page-level summaries.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};
use focalraw_core::{Calibration, PadBadChannelMap, PedestalTable, SummarySink};
use focalraw_decode::MappingVariant;
use focalraw_io::{word_kind_of, RawFileReader, Reassembler, SourceKind, PAD_LINK_ID};
use focalraw_monitor::{CycleSummary, MonitorConfig, RawMonitor};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    FocalIo(#[from] focalraw_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] focalraw_core::Error),

    #[error("Monitor error: {0}")]
    Monitor(#[from] focalraw_monitor::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{sampled} sampled file(s) given for {input} input file(s)")]
    SampledCount { input: usize, sampled: usize },
}

/// Pixel chip layout.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Layout {
    /// Inner-barrel style, 3 x 3 chips
    Ib,
    /// Outer-barrel style, 7 x 2 chips
    Ob,
}

impl From<Layout> for MappingVariant {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Ib => MappingVariant::Ib,
            Layout::Ob => MappingVariant::Ob,
        }
    }
}

/// FOCAL raw page decoder and monitor.
#[derive(Parser)]
#[command(name = "focalraw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode raw files, one processing cycle per file
    Process {
        /// Input raw file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Sampled companion of each input file, in the same order
        #[arg(long)]
        sampled: Vec<PathBuf>,

        /// Monitor configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pixel layout, overrides the configuration
        #[arg(long, value_enum)]
        layout: Option<Layout>,

        /// Pad TOT cut, overrides the configuration
        #[arg(long)]
        tot_cut: Option<u16>,

        /// Pad pedestal table (JSON); enables pedestal subtraction
        #[arg(long)]
        pedestals: Option<PathBuf>,

        /// Pad bad channel map (JSON); enables channel masking
        #[arg(long)]
        bad_channels: Option<PathBuf>,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the pages and payload totals of a raw file
    Info {
        /// Input raw file
        input: PathBuf,

        /// List every page
        #[arg(long)]
        pages: bool,
    },
}

/// Per-link totals of the `info` command.
#[derive(Default)]
struct LinkTotals {
    pages: usize,
    payload_bytes: usize,
    triggers: usize,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli.command) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Process {
            input,
            sampled,
            config,
            layout,
            tot_cut,
            pedestals,
            bad_channels,
            output,
        } => {
            if !sampled.is_empty() && sampled.len() != input.len() {
                return Err(CliError::SampledCount {
                    input: input.len(),
                    sampled: sampled.len(),
                });
            }

            let mut monitor_config = match &config {
                Some(path) => MonitorConfig::from_file(path)?,
                None => MonitorConfig::default(),
            };
            if let Some(layout) = layout {
                monitor_config.pixel_layout = layout.into();
            }
            if let Some(cut) = tot_cut {
                monitor_config.pad_tot_cut = cut;
            }

            let mut calibration = Calibration::new();
            if let Some(path) = &pedestals {
                let table = PedestalTable::from_file(path)?;
                log::info!("{} pedestal(s) from {}", table.len(), path.display());
                calibration = calibration.with_pedestals(table);
                monitor_config.subtract_pad_pedestals = true;
            }
            if let Some(path) = &bad_channels {
                let map = PadBadChannelMap::from_file(path)?;
                log::info!("{} channel status entries from {}", map.len(), path.display());
                calibration = calibration.with_channel_status(map);
                monitor_config.mask_pad_bad_channels = true;
            }

            let mut monitor = RawMonitor::new(monitor_config, calibration)?;
            let mut sink = SummarySink::new();
            let mut cycles: Vec<CycleSummary> = Vec::with_capacity(input.len());
            let start = Instant::now();

            for (i, path) in input.iter().enumerate() {
                let direct = RawFileReader::open(path)?;
                let companion = sampled.get(i).map(RawFileReader::open).transpose()?;

                let mut sources = vec![direct.source(SourceKind::Direct)];
                if let Some(reader) = &companion {
                    sources.push(reader.source(SourceKind::Sampled));
                }

                match monitor.process_cycle(&sources, &mut sink) {
                    Ok(summary) => cycles.push(summary),
                    Err(e) if e.is_cycle_error() => cycles.push(monitor.last_summary().clone()),
                    Err(e) => return Err(e.into()),
                }
            }

            let elapsed = start.elapsed();
            let lost = cycles.iter().filter(|c| c.lost).count();
            let corrupted = cycles.iter().filter(|c| c.corrupted).count();
            log::info!(
                "Processed {} cycle(s) in {:.2}s ({} lost, {} corrupted)",
                cycles.len(),
                elapsed.as_secs_f64(),
                lost,
                corrupted
            );

            let report = serde_json::json!({
                "cycles": cycles,
                "metrics": sink,
            });
            match &output {
                Some(path) => {
                    let mut writer = BufWriter::new(File::create(path)?);
                    serde_json::to_writer_pretty(&mut writer, &report)?;
                    writer.flush()?;
                    log::info!("Report written to {}", path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    serde_json::to_writer_pretty(&mut lock, &report)?;
                    writeln!(lock)?;
                }
            }
        }

        Commands::Info { input, pages } => {
            let reader = RawFileReader::open(&input)?;

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                reader.len(),
                reader.len() as f64 / 1_000_000.0
            );

            let mut links: BTreeMap<u16, LinkTotals> = BTreeMap::new();
            let mut page_count = 0usize;

            for page in reader.pages() {
                let page = page?;
                page_count += 1;
                if pages {
                    println!("{:>10}  {}", page.offset, page.header);
                }
                let totals = links.entry(page.header.link_id).or_default();
                totals.pages += 1;
                totals.payload_bytes += page.payload.len();
            }

            let mut reassembler = Reassembler::new();
            let mut walker = reassembler.walk(reader.as_bytes());
            while let Some(payload) = walker.next_payload()? {
                links.entry(payload.link_id).or_default().triggers += 1;
            }
            let dropped = reassembler.finish();

            println!("Pages: {}", page_count);
            for (link, totals) in &links {
                let kind = word_kind_of(*link);
                let (words, rest) = kind.count(totals.payload_bytes);
                println!(
                    "Link {:#06x} ({}): {} page(s), {} payload bytes ({} {:?} words{}), {} trigger(s)",
                    link,
                    if *link == PAD_LINK_ID { "pads" } else { "pixels" },
                    totals.pages,
                    totals.payload_bytes,
                    words,
                    kind,
                    if rest == 0 {
                        String::new()
                    } else {
                        format!(" + {} bytes", rest)
                    },
                    totals.triggers
                );
            }
            if dropped > 0 {
                println!("Unterminated trigger at end of file: {} bytes", dropped);
            }
        }
    }

    Ok(())
}
