//! Stratus command-line runner
//!
//! Runs, disassembles and inspects compiled chunk files (`.stbc`).

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Run and inspect compiled Stratus chunks", long_about = None)]
#[command(version)]
struct Cli {
    /// Project configuration; defaults to ./stratus.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a chunk's entry point
    Run {
        /// Chunk file
        chunk: PathBuf,
        /// Arguments passed to `main`
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
        /// Abort after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Allocations between collections; 0 disables the collector
        #[arg(long)]
        gc_interval: Option<usize>,
        /// Print collector statistics after the run
        #[arg(long)]
        stats: bool,
    },

    /// Print a readable listing of a chunk
    Disasm {
        /// Chunk file
        chunk: PathBuf,
    },

    /// Summarize a chunk's tables
    Info {
        /// Chunk file
        chunk: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            chunk,
            args,
            timeout_ms,
            gc_interval,
            stats,
        } => {
            let mut options = config::load(cli.config.as_deref())?.vm;
            if let Some(ms) = timeout_ms {
                options.timeout = Some(std::time::Duration::from_millis(ms));
            }
            if let Some(interval) = gc_interval {
                options.gc_interval = interval;
            }
            let status = commands::run::execute(&chunk, args, options, stats)?;
            std::process::exit(status);
        }

        Commands::Disasm { chunk } => commands::disasm::execute(&chunk),

        Commands::Info { chunk } => commands::info::execute(&chunk),
    }
}
