//! binstore Loader
//!
//! Loads every file under a directory into a storage, commits, then reopens
//! the storage and verifies each file's length and checksum.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use binstore::loader::{self, LoadOptions};
use binstore::Config;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// binstore Loader
#[derive(Parser, Debug)]
#[command(name = "binstore-loader")]
#[command(about = "Load a directory tree into binstore and verify it")]
#[command(version)]
struct Args {
    /// Directory whose files are loaded (recursively)
    input_dir: PathBuf,

    /// Working folder of the storage
    storage_dir: PathBuf,

    /// Number of worker threads
    #[arg(short, long, default_value_t = loader::DEFAULT_THREADS)]
    threads: usize,

    /// Attempts per file while the index lock keeps timing out
    #[arg(short, long, default_value_t = loader::DEFAULT_RETRIES)]
    retries: u32,

    /// Index lock timeout in seconds
    #[arg(long, default_value = "90")]
    index_timeout_secs: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,binstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("binstore loader v{}", binstore::VERSION);

    if !args.input_dir.is_dir() {
        tracing::error!("Input directory does not exist: {}", args.input_dir.display());
        std::process::exit(2);
    }

    let files = match loader::collect_files(&args.input_dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::error!("Failed to enumerate {}: {}", args.input_dir.display(), e);
            std::process::exit(1);
        }
    };

    let config = Config::builder()
        .working_folder(&args.storage_dir)
        .index_timeout(Duration::from_secs(args.index_timeout_secs))
        .build();
    let options = LoadOptions {
        threads: args.threads,
        retries: args.retries,
    };

    // Create storage and add data
    tracing::info!("Creating storage from {} ({} files)", args.input_dir.display(), files.len());
    let started = Instant::now();
    if let Err(e) = loader::load(&config, &files, &options) {
        tracing::error!("Load failed: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Time to create: {:?}", started.elapsed());

    // Open storage and read data
    tracing::info!("Verifying data");
    let started = Instant::now();
    if let Err(e) = loader::verify(&config, &files, options.threads) {
        tracing::error!("Verification failed: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Time to verify: {:?}", started.elapsed());
}
