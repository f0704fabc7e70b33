use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dataproxy::codec::Compression;
use dataproxy::config::{decode_key, ServerConfig};
use dataproxy::{walk_chain, Dispatcher, HttpServer, Logger, PageStore};

mod cli;

use cli::{Cli, Cmd, StoreArgs};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_POLL: Duration = Duration::from_millis(250);

fn init_logger(file: Option<&Path>) -> Result<()> {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    let mut b = Builder::from_env(Env::default().default_filter_or("info"));
    b.format_timestamp_millis();
    if let Some(p) = file {
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(p)
            .with_context(|| format!("open log {}", p.display()))?;
        b.target(Target::Pipe(Box::new(f)));
    }
    b.init();
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Serve {
            store,
            port,
            addr,
            log,
            max_handlers,
            ingest_root,
            stop_file,
        } => {
            let mut cfg = load_config(&store)?;
            if let Some(p) = port {
                cfg = cfg.with_addr(format!("0.0.0.0:{}", p));
            }
            if let Some(a) = addr {
                cfg = cfg.with_addr(a);
            }
            if log.is_some() {
                cfg = cfg.with_log_file(log);
            }
            if let Some(n) = max_handlers {
                cfg = cfg.with_max_handlers(n);
            }
            if ingest_root.is_some() {
                cfg = cfg.with_ingest_root(ingest_root);
            }
            cfg.validate()?;
            serve(cfg, stop_file)
        }
        Cmd::Purge { store, hash } => {
            init_logger(None)?;
            let cfg = load_config(&store)?;
            let store = PageStore::new(Arc::new(cfg.store), Logger::root());
            let removed = store.remove_dataset(&hash)?;
            println!("{}", if removed { "removed" } else { "not found" });
            Ok(())
        }
        Cmd::Walk {
            store,
            hash,
            token,
            json,
        } => {
            init_logger(None)?;
            let cfg = load_config(&store)?;
            let store = PageStore::new(Arc::new(cfg.store), Logger::root());
            let mut pages = 0usize;
            let mut records = 0usize;
            for page in walk_chain(&store, &hash, &token) {
                let page = page?;
                pages += 1;
                records += page.data.records.len();
                if json {
                    println!("{}", serde_json::to_string(&page)?);
                } else {
                    println!(
                        "page {:>4}: {:>6} records, next={}",
                        pages,
                        page.data.records.len(),
                        page.next_token().unwrap_or("<end>")
                    );
                }
            }
            if !json {
                println!("{} pages, {} records", pages, records);
            }
            Ok(())
        }
    }
}

/// defaults -> TOML -> ENV -> флаги.
fn load_config(args: &StoreArgs) -> Result<ServerConfig> {
    let mut cfg = ServerConfig::load(args.config.as_deref())?;
    if let Some(root) = &args.cache {
        cfg.store.root = root.clone();
    }
    if let Some(salt) = &args.salt {
        cfg.store.salt = salt.clone().into_bytes();
    }
    if let Some(key) = decode_key(args.key.clone(), args.key_hex.clone(), None)? {
        cfg.store = cfg.store.with_key(key)?;
    }
    if args.zip {
        cfg.store.compression = Compression::Gzip;
    }
    if let Some(c) = args.compression {
        cfg.store.compression = c;
    }
    Ok(cfg)
}

fn serve(cfg: ServerConfig, stop_file: Option<PathBuf>) -> Result<()> {
    init_logger(cfg.log_file.as_deref())?;
    let log = Logger::root();
    log.info(format_args!("Starting on {} with {}", cfg.addr, cfg));

    let dispatcher = Arc::new(Dispatcher::new(&cfg, log.clone()));
    let server = HttpServer::bind(&cfg.addr, dispatcher.clone(), log.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(path) = stop_file {
        watch_stop_file(path, stop.clone(), log.clone())?;
    }
    server.serve_until(&stop);

    dispatcher.drain(Some(DRAIN_TIMEOUT));
    log.info("Stopped");
    Ok(())
}

/// Выставить `stop`, когда появится файл `path`.
fn watch_stop_file(path: PathBuf, stop: Arc<AtomicBool>, log: Logger) -> Result<()> {
    thread::Builder::new()
        .name("dp-stop-watch".into())
        .spawn(move || {
            while !path.exists() {
                thread::sleep(STOP_POLL);
            }
            log.info(format_args!("Stop file {} found, shutting down", path.display()));
            stop.store(true, Ordering::Relaxed);
        })
        .context("spawn stop-file watcher")?;
    Ok(())
}
