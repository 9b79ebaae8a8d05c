//! mpool CLI
//!
//! Command-line tools for exercising the mpool page cache against real files.
//!
//! # Commands
//!
//! - `checkpoint` - Dirty pages of several files and checkpoint the cache
//! - `flush-file` - Dirty pages of one file and flush only that file
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::PoolShape;
use mpool_core::{PoolConfig, DEFAULT_PAGE_SIZE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// mpool command-line page cache tools.
#[derive(Parser)]
#[command(name = "mpool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the pool's files
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Number of cache regions
    #[arg(global = true, long, default_value_t = 4)]
    regions: usize,

    /// Buffers per region
    #[arg(global = true, long, default_value_t = 256)]
    buffers: usize,

    /// Page size in bytes
    #[arg(global = true, long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dirty pages of several files and checkpoint the cache
    Checkpoint {
        /// Number of data files
        #[arg(short, long, default_value = "2")]
        files: usize,

        /// Pages dirtied per file
        #[arg(short = 'n', long, default_value = "64")]
        pages: u32,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Dirty pages of one file and flush only that file
    FlushFile {
        /// File name inside the pool directory
        #[arg(short, long, default_value = "data0.db")]
        file: String,

        /// Pages dirtied
        #[arg(short = 'n', long, default_value = "64")]
        pages: u32,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let shape = PoolShape {
        regions: cli.regions,
        buffers: cli.buffers,
        page_size: cli.page_size,
    };

    match cli.command {
        Commands::Checkpoint {
            files,
            pages,
            format,
        } => {
            let path = cli.path.ok_or("Pool directory required for checkpoint")?;
            commands::checkpoint::run(&path, shape, files, pages, &format)?;
        }
        Commands::FlushFile {
            file,
            pages,
            format,
        } => {
            let path = cli.path.ok_or("Pool directory required for flush-file")?;
            commands::flush_file::run(&path, shape, &file, pages, &format)?;
        }
        Commands::Version => {
            let defaults = PoolConfig::default();
            println!("mpool CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Default cache: {} regions x {} buffers",
                defaults.regions, defaults.buffers_per_region
            );
        }
    }

    Ok(())
}
