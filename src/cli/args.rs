use crate::readers::ReadStrategy;
use crate::writers::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brc-aggregator")]
#[command(about = "Per-station min/mean/max over billion-row measurement files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "TOML settings file (overridden by BRC_* variables and flags)"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate a measurements file and print the per-station report
    Process {
        #[arg(short, long, help = "Input file of `<station>;<value>` lines")]
        input: PathBuf,

        #[arg(short, long, help = "Worker threads [default: number of CPUs]")]
        workers: Option<usize>,

        #[arg(short, long, value_enum, help = "How the input is read [default: mmap]")]
        strategy: Option<ReadStrategy>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[arg(long, help = "Window size in bytes for the read strategy")]
        buffer_size: Option<usize>,

        #[arg(long, help = "Maximum number of distinct stations")]
        table_capacity: Option<usize>,

        #[arg(long, help = "Show a progress bar on stderr")]
        progress: bool,
    },

    /// Show how the input would be split between workers
    Plan {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, help = "Worker threads [default: number of CPUs]")]
        workers: Option<usize>,
    },

    /// Check every record against the input format without aggregating
    Validate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "100", help = "Violations to list in detail")]
        max_violations: usize,
    },
}
