use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tracing::Level;

mod commands;

/// Standardized exit codes for CLI.
/// 0 = OK, 2 = input error, 3 = not found, 1 = other.
#[allow(dead_code)]
const EXIT_OK: i32 = 0;
const EXIT_OTHER: i32 = 1;
const EXIT_INPUT: i32 = 2;
const EXIT_NOT_FOUND: i32 = 3;

#[derive(Parser)]
#[command(name = "wrapx", version, about = "wrapvm CLI: manage stored contract code")]
struct Cli {
    /// Data directory; code lives under <data-dir>/wasm
    #[arg(long, env = "WRAPVM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log store activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SHA-256 checksum of a file without storing it
    Checksum {
        /// Path to bytecode file
        file: String,
    },
    /// Store a bytecode file and print its checksum
    Create {
        /// Path to bytecode file (or - for stdin)
        #[arg(default_value = "-")]
        file: String,
    },
    /// Fetch stored bytecode by checksum
    Get {
        /// Hex checksum
        checksum: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Show the capability report of stored code
    Analyze {
        /// Hex checksum
        checksum: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored checksums
    List,
}

fn exit_code_for(err: &str) -> i32 {
    // store I/O errors quote the failed operation ("storage: read <path>: ...")
    if err.starts_with("storage:") {
        EXIT_OTHER
    } else if err.contains("not found") {
        EXIT_NOT_FOUND
    } else if err.contains("read ") || err.contains("parse ") || err.contains("invalid ") {
        EXIT_INPUT
    } else {
        EXIT_OTHER
    }
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(|| wrap_config::DATA_DIR.clone());

    let result = match cli.command {
        Commands::Checksum { file } => commands::checksum(&file),
        Commands::Create { file } => commands::create(&data_dir, &file),
        Commands::Get { checksum, out } => commands::get(&data_dir, &checksum, out.as_deref()),
        Commands::Analyze { checksum, json } => commands::analyze(&data_dir, &checksum, json),
        Commands::List => commands::list(&data_dir),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(exit_code_for(&e));
    }
}
