use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use perf_results::{EvaluateOptions, ThresholdTable, DEFAULT_TARGET_FLOWS};
use tracing::Level;

use crate::{process_archive, ProcessOutcome, ReportRequest};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Add a PASS/FAIL sheet for an archived OVS performance run to an XLSX report."
)]
pub struct Args {
    /// Report workbook; created if missing, otherwise new sheets are appended.
    #[arg(short = 'o', long, value_name = "PATH")]
    output: PathBuf,

    /// Results tarball (plain, gzip, bzip2 or xz).
    #[arg(short = 's', long = "result_tar_file", value_name = "PATH")]
    result_tar_file: PathBuf,

    /// JSON file replacing the built-in throughput thresholds.
    #[arg(long, value_name = "PATH")]
    thresholds: Option<PathBuf>,

    /// Flow count whose throughput row is judged.
    #[arg(long, default_value_t = DEFAULT_TARGET_FLOWS)]
    target_flows: u64,

    /// Exit with status 1 when the run fails its checks.
    #[arg(long)]
    exit_code: bool,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

pub fn run() -> Result<()> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    init_logging(args.verbose);

    if !args.result_tar_file.is_file() {
        anyhow::bail!(
            "result archive {} does not exist",
            args.result_tar_file.display()
        );
    }

    let thresholds = match &args.thresholds {
        Some(path) => ThresholdTable::from_json_path(path)
            .with_context(|| format!("load thresholds from {}", path.display()))?,
        None => ThresholdTable::builtin(),
    };

    let request = ReportRequest {
        archive: args.result_tar_file.clone(),
        output: args.output.clone(),
        options: EvaluateOptions {
            target_flows: args.target_flows,
            thresholds,
        },
    };

    match process_archive(&request)? {
        ProcessOutcome::Reported { sheet, verdict } => {
            println!("{sheet}");
            if args.exit_code && verdict.is_failed() {
                std::process::exit(1);
            }
        }
        ProcessOutcome::Ignored(reason) => {
            println!(
                "{}: not a recognised results archive ({reason})",
                args.result_tar_file.display()
            );
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // Library crates log through `log`; the subscriber picks those records up too.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}
