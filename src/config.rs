//! Centralized configuration for the data-proxy cache.
//!
//! Goals:
//! - One immutable StoreConfig shared (via Arc) by every request after startup.
//! - ServerConfig wraps it with the listener / pool / logging knobs.
//! - Layering, lowest to highest: defaults -> TOML file -> env (DP_*) -> CLI flags
//!   (the binary applies the last layer through the builder setters).
//!
//! Env:
//! - DP_ADDR           listen address (default 0.0.0.0:8080)
//! - DP_CACHE_ROOT     cache root directory (default /tmp)
//! - DP_SALT           salt mixed into page file names (default empty)
//! - DP_KEY / DP_KEY_HEX / DP_KEY_BASE64 - AES key, 16 or 32 bytes (raw / hex / base64)
//! - DP_COMPRESSION    none|gzip|zstd (default none)
//! - DP_MAX_HANDLERS   concurrent page-retrieval workers (default 16)
//! - DP_LOG_FILE       log sink file (default stderr)
//! - DP_INGEST_ROOT    optional directory that confines CSV ingestion paths

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde::Deserialize;
use zeroize::Zeroize;

use crate::codec::{Compression, PageCipher};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CACHE_ROOT: &str = "/tmp";
pub const DEFAULT_MAX_HANDLERS: usize = 16;

/// Store-wide settings. Built once at startup, read-only afterwards.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base directory; one sub-directory per dataset hash.
    pub root: PathBuf,
    /// Filename namespacing only, not an encryption secret.
    pub salt: Vec<u8>,
    /// If set, every page is AEAD-encrypted.
    pub cipher: Option<PageCipher>,
    pub compression: Compression,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_ROOT),
            salt: Vec::new(),
            cipher: None,
            compression: Compression::None,
        }
    }
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_salt<S: AsRef<[u8]>>(mut self, salt: S) -> Self {
        self.salt = salt.as_ref().to_vec();
        self
    }

    pub fn with_cipher(mut self, cipher: Option<PageCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Build the cipher from raw key bytes; the passed buffer is zeroized.
    pub fn with_key(mut self, mut key: Vec<u8>) -> Result<Self> {
        let built = PageCipher::new(&key);
        key.zeroize();
        self.cipher = Some(built.context("build page cipher")?);
        Ok(self)
    }

    pub fn with_compression(mut self, c: Compression) -> Self {
        self.compression = c;
        self
    }

    pub fn encryption_enabled(&self) -> bool {
        self.cipher.is_some()
    }
}

impl fmt::Display for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreConfig {{ root: {}, salt_len: {}, cipher: {}, compression: {} }}",
            self.root.display(),
            self.salt.len(),
            self.cipher.as_ref().map(|c| c.algorithm()).unwrap_or("none"),
            self.compression,
        )
    }
}

/// Top-level server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    pub store: StoreConfig,
    /// Upper bound on live page-retrieval workers.
    pub max_handlers: usize,
    pub log_file: Option<PathBuf>,
    /// If set, `/existing` may only read files under this directory.
    pub ingest_root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            store: StoreConfig::default(),
            max_handlers: DEFAULT_MAX_HANDLERS,
            log_file: None,
            ingest_root: None,
        }
    }
}

/// TOML shape of the config file. Every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub addr: Option<String>,
    pub cache_root: Option<PathBuf>,
    pub salt: Option<String>,
    pub key: Option<String>,
    pub key_hex: Option<String>,
    pub key_base64: Option<String>,
    pub compression: Option<Compression>,
    pub max_handlers: Option<usize>,
    pub log_file: Option<PathBuf>,
    pub ingest_root: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }
}

impl ServerConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Defaults, then the optional TOML file, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(p) = file {
            cfg = cfg.apply_file(FileConfig::load(p)?)?;
        }
        cfg.apply_env()
    }

    pub fn apply_file(mut self, fc: FileConfig) -> Result<Self> {
        if let Some(v) = fc.addr {
            self.addr = v;
        }
        if let Some(v) = fc.cache_root {
            self.store.root = v;
        }
        if let Some(v) = fc.salt {
            self.store.salt = v.into_bytes();
        }
        if let Some(key) = decode_key(fc.key, fc.key_hex, fc.key_base64)? {
            self.store = self.store.with_key(key)?;
        }
        if let Some(v) = fc.compression {
            self.store.compression = v;
        }
        if let Some(v) = fc.max_handlers {
            self.max_handlers = v;
        }
        if fc.log_file.is_some() {
            self.log_file = fc.log_file;
        }
        if fc.ingest_root.is_some() {
            self.ingest_root = fc.ingest_root;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(v) = env_nonempty("DP_ADDR") {
            self.addr = v;
        }
        if let Some(v) = env_nonempty("DP_CACHE_ROOT") {
            self.store.root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DP_SALT") {
            self.store.salt = v.into_bytes();
        }
        let key = decode_key(
            env_nonempty("DP_KEY"),
            env_nonempty("DP_KEY_HEX"),
            env_nonempty("DP_KEY_BASE64"),
        )?;
        if let Some(key) = key {
            self.store = self.store.with_key(key)?;
        }
        if let Some(v) = env_nonempty("DP_COMPRESSION") {
            self.store.compression = v.parse()?;
        }
        if let Some(v) = env_nonempty("DP_MAX_HANDLERS") {
            self.max_handlers = v
                .parse()
                .map_err(|e| anyhow!("DP_MAX_HANDLERS='{}': {}", v, e))?;
        }
        if let Some(v) = env_nonempty("DP_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = env_nonempty("DP_INGEST_ROOT") {
            self.ingest_root = Some(PathBuf::from(v));
        }
        self.validate()?;
        Ok(self)
    }

    // ----- builder-style overrides (CLI layer) -----

    pub fn with_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_max_handlers(mut self, n: usize) -> Self {
        self.max_handlers = n;
        self
    }

    pub fn with_log_file(mut self, p: Option<PathBuf>) -> Self {
        self.log_file = p;
        self
    }

    pub fn with_ingest_root(mut self, p: Option<PathBuf>) -> Self {
        self.ingest_root = p;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_handlers == 0 {
            return Err(anyhow!("max_handlers must be at least 1"));
        }
        Ok(())
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServerConfig {{ addr: {}, store: {}, max_handlers: {}, log_file: {}, ingest_root: {} }}",
            self.addr,
            self.store,
            self.max_handlers,
            self.log_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stderr".to_string()),
            self.ingest_root
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unrestricted".to_string()),
        )
    }
}

/// Pick the first provided key form: hex, then base64, then raw string bytes.
pub fn decode_key(
    raw: Option<String>,
    hex_form: Option<String>,
    b64_form: Option<String>,
) -> Result<Option<Vec<u8>>> {
    if let Some(mut h) = hex_form {
        let out = hex::decode(h.trim()).map_err(|e| anyhow!("hex key: {}", e));
        h.zeroize();
        return out.map(Some);
    }
    if let Some(mut b) = b64_form {
        let out = base64::engine::general_purpose::STANDARD
            .decode(b.trim().as_bytes())
            .map_err(|e| anyhow!("base64 key: {}", e));
        b.zeroize();
        return out.map(Some);
    }
    Ok(raw.filter(|s| !s.is_empty()).map(String::into_bytes))
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
