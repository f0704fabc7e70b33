use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use dataproxy::codec::Compression;

/// CLI data-proxy кэша
#[derive(Parser, Debug)]
#[command(name = "dataproxy", version, about = "Paginated dataset cache server")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Параметры хранилища; перекрывают TOML/ENV.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Config file (TOML). Flags override config and env values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Location of cache
    #[arg(long = "cache")]
    pub cache: Option<PathBuf>,
    /// AES key for cache (raw string, 16 or 32 bytes)
    #[arg(long)]
    pub key: Option<String>,
    /// AES key as hex
    #[arg(long)]
    pub key_hex: Option<String>,
    /// Salt for cache filenames
    #[arg(long)]
    pub salt: Option<String>,
    /// Compress cache files with gzip (shorthand for --compression gzip)
    #[arg(long, default_value_t = false)]
    pub zip: bool,
    /// Page compression: none|gzip|zstd
    #[arg(long)]
    pub compression: Option<Compression>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run the HTTP server
    Serve {
        #[command(flatten)]
        store: StoreArgs,
        /// Port on which to listen (binds 0.0.0.0:<port>)
        #[arg(long)]
        port: Option<u16>,
        /// Full listen address; wins over --port
        #[arg(long)]
        addr: Option<String>,
        /// Log file name (default: stderr)
        #[arg(long)]
        log: Option<PathBuf>,
        /// Max concurrent page-retrieval workers
        #[arg(long)]
        max_handlers: Option<usize>,
        /// Confine /existing file names to this directory
        #[arg(long)]
        ingest_root: Option<PathBuf>,
        /// Stop accepting requests once this file exists, then drain page writes
        #[arg(long)]
        stop_file: Option<PathBuf>,
    },
    /// Delete every page of a dataset
    Purge {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        hash: String,
    },
    /// Walk a page chain from its first token and print a per-page summary
    Walk {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        hash: String,
        #[arg(long)]
        token: String,
        /// Print each page as JSON (one per line)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
