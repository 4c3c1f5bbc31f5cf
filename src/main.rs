use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::{info, LevelFilter};
use serde::Serialize;

use oa_reader::oadb::types::models::{
    DEFAULT_MAX_TABLE_BYTES, DEFAULT_MAX_TRAILING_VALUES, DEFAULT_PLAUSIBILITY_BOUND,
};
use oa_reader::{correlate, DecodeOptions, DecodeReport, OaReader, ResolvedNet};

/// Decodes a schematic database file and prints what it finds as JSON.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Database file to read.
    path: PathBuf,

    /// Also run the connectivity scan over every non-string table.
    #[arg(long)]
    connectivity: bool,

    /// Report every occurrence of this string index.
    #[arg(long, value_name = "N")]
    probe_index: Option<u16>,

    /// Table ID searched by --probe-index (decimal or 0x-prefixed hex).
    #[arg(long, value_name = "ID", default_value = "0x0c", value_parser = parse_table_id)]
    probe_table: u64,

    /// Resolve connectivity OIDs against instance tables. Implies --connectivity.
    #[arg(long)]
    correlate: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_TABLE_BYTES)]
    max_table_bytes: u64,

    #[arg(long, default_value_t = DEFAULT_PLAUSIBILITY_BOUND)]
    plausibility_bound: u32,

    /// Most trailing values read after a connectivity string index.
    #[arg(long, default_value_t = DEFAULT_MAX_TRAILING_VALUES)]
    max_trailing_values: usize,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Write the output here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    report: DecodeReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    nets: Option<Vec<ResolvedNet>>,
}

impl Args {
    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_table_bytes: self.max_table_bytes,
            plausibility_bound: self.plausibility_bound,
            max_trailing_values: self.max_trailing_values,
        }
    }
}

fn parse_table_id(s: &str) -> std::result::Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid table id '{}': {}", s, e))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = args.decode_options();

    let output = {
        let mut reader = OaReader::open(&args.path, options)
            .with_context(|| format!("failed to read {}", args.path.display()))?;
        let mut report = DecodeReport::new(reader.header, reader.directory().clone());
        reader.decode(&mut report)?;

        if args.connectivity || args.correlate {
            reader.scan_connectivity(&mut report)?;
        }
        if let Some(target) = args.probe_index {
            reader.probe_tables(args.probe_table, target, &mut report)?;
        }

        let nets = args.correlate.then(|| correlate(&report));
        Output { report, nets }
    };
    info!(
        "{} decoded records, {} candidates",
        output.report.decoded.len(),
        output.report.candidates.len()
    );

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    if args.pretty {
        serde_json::to_writer_pretty(&mut writer, &output)?;
    } else {
        serde_json::to_writer(&mut writer, &output)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
