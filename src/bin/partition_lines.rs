//! Command line entry point: partition a text file into per initial letter files and sort
//! them.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use regex::bytes::Regex;
use simple_logger::SimpleLogger;

use text_file_partition::partition::Partition;
use text_file_partition::summary::PartitionOutcome;

#[derive(Parser, Debug)]
#[command(version, about = "Split the lines of a text file by their first letter and sort each part")]
struct Cli {
    /// Input file
    #[arg(short, long, default_value = "input.txt")]
    input: PathBuf,

    /// Output directory, created on demand
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Number of byte ranges read concurrently, 0 uses all cores
    #[arg(short, long, default_value_t = 0)]
    tasks: usize,

    /// Number of threads writing bucket files
    #[arg(short, long, default_value_t = 4)]
    consumers: usize,

    /// Capacity of the routing queue in lines
    #[arg(long, default_value_t = 4096)]
    queue_size: usize,

    /// Strip a '\r' preceding the line ending
    #[arg(long)]
    trim_cr: bool,

    /// Skip lines matching this regular expression
    #[arg(long)]
    ignore: Option<String>,

    /// Fail when lines are dropped because a bucket file cannot be written
    #[arg(long)]
    strict: bool,

    /// Verify an existing output directory instead of partitioning
    #[arg(long)]
    check: bool,

    /// Log progress of every stage
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = if cli.verbose { LevelFilter::Info } else { LevelFilter::Warn };
    SimpleLogger::new().with_level(level).init()?;

    let mut partition = Partition::new(cli.input, cli.output);
    partition.with_tasks(cli.tasks);
    partition.with_consumers(cli.consumers);
    partition.with_queue_size(cli.queue_size);
    partition.with_trim_cr(cli.trim_cr);
    partition.with_fail_on_sink_error(cli.strict);
    if let Some(pattern) = cli.ignore {
        partition.with_ignore_lines(Regex::new(&pattern)?);
    }

    if cli.check {
        return if partition.check()? {
            eprintln!("Output is partitioned and sorted.");
            Ok(ExitCode::SUCCESS)
        } else {
            eprintln!("Output is not partitioned and sorted.");
            Ok(ExitCode::FAILURE)
        };
    }

    match partition.run()? {
        PartitionOutcome::EmptyInput => {
            eprintln!("Input file is empty.");
        }
        PartitionOutcome::Completed(summary) => {
            if summary.lines_dropped() > 0 || !summary.buckets_failed().is_empty() {
                eprintln!(
                    "Dropped {} lines, failed to sort {} buckets.",
                    summary.lines_dropped(),
                    summary.buckets_failed().len()
                );
            }
            eprintln!(
                "Processing and sorting finished: {} lines in {} buckets.",
                summary.lines_written(),
                summary.buckets_sorted().len() + summary.buckets_failed().len()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
