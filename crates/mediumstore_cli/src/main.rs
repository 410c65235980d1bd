//! Medium Store CLI
//!
//! Command-line tools for reading and editing files through the medium store.
//!
//! # Commands
//!
//! - `info` - Display file length and access flags
//! - `dump` - Hex dump a byte range
//! - `insert` - Insert bytes and flush
//! - `remove` - Remove bytes and flush
//! - `replace` - Replace bytes and flush

mod commands;

use clap::{Parser, Subcommand};
use mediumstore_core::{MediumConfig, DEFAULT_MAX_READ_WRITE_BLOCK_SIZE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Medium store command-line tools.
#[derive(Parser)]
#[command(name = "mediumstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Maximum bytes per physical read or write
    #[arg(global = true, long, default_value_t = DEFAULT_MAX_READ_WRITE_BLOCK_SIZE)]
    block_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display file length and access flags
    Info {
        /// File to inspect
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Hex dump a byte range
    Dump {
        /// File to read
        file: PathBuf,

        /// First byte to dump
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Number of bytes to dump
        #[arg(short, long, default_value = "256")]
        len: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Insert bytes before an offset
    Insert {
        /// File to edit
        file: PathBuf,

        /// Insert position
        #[arg(short, long)]
        offset: u64,

        /// Bytes to insert, hex encoded
        #[arg(long)]
        hex: String,
    },

    /// Remove a byte range
    Remove {
        /// File to edit
        file: PathBuf,

        /// First byte to remove
        #[arg(short, long)]
        offset: u64,

        /// Number of bytes to remove
        #[arg(short, long)]
        len: u64,
    },

    /// Replace a byte range
    Replace {
        /// File to edit
        file: PathBuf,

        /// First byte to replace
        #[arg(short, long)]
        offset: u64,

        /// Number of bytes to replace
        #[arg(short, long)]
        len: u64,

        /// Replacement bytes, hex encoded
        #[arg(long)]
        hex: String,
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

    let config = MediumConfig::new().max_read_write_block_size(cli.block_size);
    config.validate()?;

    match cli.command {
        Commands::Info { file, format } => {
            commands::info::run(&file, config, &format)?;
        }
        Commands::Dump {
            file,
            offset,
            len,
            format,
        } => {
            commands::dump::run(&file, config, offset, len, &format)?;
        }
        Commands::Insert { file, offset, hex } => {
            let edit = commands::edit::Edit::Insert {
                offset,
                bytes: hex::decode(&hex)?,
            };
            commands::edit::run(&file, config, &edit)?;
        }
        Commands::Remove { file, offset, len } => {
            let edit = commands::edit::Edit::Remove { offset, len };
            commands::edit::run(&file, config, &edit)?;
        }
        Commands::Replace {
            file,
            offset,
            len,
            hex,
        } => {
            let edit = commands::edit::Edit::Replace {
                offset,
                len,
                bytes: hex::decode(&hex)?,
            };
            commands::edit::run(&file, config, &edit)?;
        }
        Commands::Version => {
            println!("Medium Store CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
