//! store - файловое хранилище страниц, адресуемое производным солёным хэшем.
//!
//! Раскладка:
//!   <root>/<dataset_hash>/<hex(SHA-256(salt || dataset_hash || page_token))>
//!
//! Свойства:
//! - Ключ - чистая функция (salt, hash, token): повтор write идемпотентен.
//! - Страницы датасета лежат в одном каталоге: remove_dataset удаляет их разом.
//! - Повторная запись того же ключа полностью перезаписывает blob (tmp + rename).
//!
//! Ошибки наружу намеренно обобщены: при промахе не сообщаем,
//! какая половина ключа (hash или token) неверна.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::codec;
use crate::config::StoreConfig;
use crate::logging::Logger;
use crate::page::PageInfo;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Неизвестный hash/token, либо страница ещё (или уже никогда) не записана.
    #[error("invalid request or page token")]
    InvalidPageReference,

    /// Тег AEAD не сошёлся, blob обрезан или не распаковывается.
    #[error("internal failure handling page")]
    CorruptOrTamperedPage,

    /// Ошибка диска/ФС на пути записи (или чтения, кроме NotFound).
    #[error("storage unavailable")]
    StorageUnavailable(#[source] std::io::Error),
}

/// Хранилище страниц. Дёшево клонируется: конфиг общий (Arc), логгер - per request.
#[derive(Clone, Debug)]
pub struct PageStore {
    cfg: Arc<StoreConfig>,
    log: Logger,
}

impl PageStore {
    pub fn new(cfg: Arc<StoreConfig>, log: Logger) -> Self {
        Self { cfg, log }
    }

    /// Тот же store с другим логгером (например, со scope конкретного запроса).
    pub fn with_logger(&self, log: Logger) -> Self {
        Self {
            cfg: self.cfg.clone(),
            log,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn root(&self) -> &Path {
        &self.cfg.root
    }

    /// Каталог датасета. Hash проходит проверку (без `/`, `..` и т.п.).
    pub fn dataset_dir(&self, dataset_hash: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_hash(dataset_hash) {
            return Err(StoreError::InvalidPageReference);
        }
        Ok(self.cfg.root.join(dataset_hash))
    }

    /// Полный путь файла страницы.
    pub fn page_path(&self, info: &PageInfo) -> Result<PathBuf, StoreError> {
        if info.page_token.is_empty() {
            return Err(StoreError::InvalidPageReference);
        }
        let dir = self.dataset_dir(&info.dataset_hash)?;
        Ok(dir.join(page_key(&self.cfg.salt, &info.dataset_hash, &info.page_token)))
    }

    /// compress -> encrypt -> записать, перезаписывая прежнее содержимое ключа.
    pub fn write(&self, payload: &[u8], info: &PageInfo) -> Result<(), StoreError> {
        let token = &info.page_token;
        self.log.debug(format_args!("Page {}: Writing", token));

        let path = self.page_path(info)?;

        let mut data = if self.cfg.compression.is_enabled() {
            self.log.debug(format_args!("Page {}: Compressing ({})", token, self.cfg.compression));
            codec::compress(self.cfg.compression, payload).map_err(|e| {
                self.log.error(format_args!("Page {}: compress error - {}", token, e));
                StoreError::StorageUnavailable(e)
            })?
        } else {
            payload.to_vec()
        };

        if let Some(cipher) = &self.cfg.cipher {
            self.log.debug(format_args!("Page {}: Encrypting", token));
            data = cipher.seal(&data).map_err(|e| {
                self.log.error(format_args!("Page {}: encrypt error - {}", token, e));
                StoreError::StorageUnavailable(std::io::Error::new(ErrorKind::Other, e))
            })?;
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                self.log.error(format_args!("Page {}: create dir {} - {}", token, dir.display(), e));
                StoreError::StorageUnavailable(e)
            })?;
        }

        write_replace(&path, &data).map_err(|e| {
            self.log.error(format_args!("Page {}: Error writing to disk - {}", token, e));
            StoreError::StorageUnavailable(e)
        })?;

        self.log.debug(format_args!("Page {}: Writing to Disk Completed ({} bytes)", token, data.len()));
        Ok(())
    }

    /// Прочитать и вернуть исходный payload страницы.
    pub fn read(&self, info: &PageInfo) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        self.read_into(info, &mut out)?;
        Ok(out)
    }

    /// Как read, но результат кладётся в `out` (буфер очищается). Для scratch-буферов воркеров.
    pub fn read_into(&self, info: &PageInfo, out: &mut Vec<u8>) -> Result<(), StoreError> {
        let token = &info.page_token;
        self.log.debug(format_args!("Page {}: Retrieving", token));
        out.clear();

        let path = self.page_path(info)?;
        let raw = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.log.debug(format_args!("Page {}: not found", token));
                return Err(StoreError::InvalidPageReference);
            }
            Err(e) => {
                self.log.error(format_args!("Page {}: Error reading from disk - {}", token, e));
                return Err(StoreError::StorageUnavailable(e));
            }
        };

        let plain = match &self.cfg.cipher {
            Some(cipher) => match cipher.open(&raw) {
                Ok(p) => p,
                Err(e) => {
                    self.log.error(format_args!("Page {}: Error decrypting - {}", token, e));
                    return Err(StoreError::CorruptOrTamperedPage);
                }
            },
            None => raw,
        };

        if self.cfg.compression.is_enabled() && !info.is_already_compressed {
            if let Err(e) = codec::decompress_into(self.cfg.compression, &plain, out) {
                out.clear();
                self.log.error(format_args!("Page {}: decompress error - {}", token, e));
                return Err(StoreError::CorruptOrTamperedPage);
            }
        } else {
            out.extend_from_slice(&plain);
        }

        self.log.debug(format_args!("Page {}: Completed retrieval ({} bytes)", token, out.len()));
        Ok(())
    }

    /// Существует ли blob страницы (без чтения/расшифровки).
    pub fn exists(&self, info: &PageInfo) -> bool {
        self.page_path(info).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Удалить все страницы датасета. Ok(false), если каталога не было.
    pub fn remove_dataset(&self, dataset_hash: &str) -> Result<bool, StoreError> {
        let dir = self.dataset_dir(dataset_hash)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                self.log.info(format_args!("Dataset {}: removed", dataset_hash));
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                self.log.error(format_args!("Dataset {}: remove error - {}", dataset_hash, e));
                Err(StoreError::StorageUnavailable(e))
            }
        }
    }
}

// ----------------- утилиты -----------------

/// hex(SHA-256(salt || dataset_hash || page_token)).
pub fn page_key(salt: &[u8], dataset_hash: &str, page_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(dataset_hash.as_bytes());
    hasher.update(page_token.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_valid_hash(h: &str) -> bool {
    !h.is_empty()
        && h.len() <= 128
        && h.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Записать через уникальный tmp + rename: читатель не увидит полузаписанный blob.
fn write_replace(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("tmp-{:016x}", rand::thread_rng().next_u64()));
    let res = (|| {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn page_key_is_pure() {
        let a = page_key(b"salt", "hash", "token");
        let b = page_key(b"salt", "hash", "token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn page_key_depends_on_every_input() {
        let base = page_key(b"salt", "hash", "token");
        assert_ne!(base, page_key(b"pepper", "hash", "token"));
        assert_ne!(base, page_key(b"salt", "hash2", "token"));
        assert_ne!(base, page_key(b"salt", "hash", "token2"));
    }

    #[test]
    fn page_key_no_collisions_in_sample() {
        let mut seen = HashSet::new();
        for h in 0..50 {
            for t in 0..200 {
                let k = page_key(b"s", &format!("h{h}"), &format!("t{t}"));
                assert!(seen.insert(k));
            }
        }
    }

    #[test]
    fn hash_validation() {
        assert!(is_valid_hash("0b1e8f3a-1c2d-4e5f-8a9b-0c1d2e3f4a5b"));
        assert!(is_valid_hash("abc_DEF-1"));
        assert!(!is_valid_hash(""));
        assert!(!is_valid_hash(".."));
        assert!(!is_valid_hash("a/b"));
        assert!(!is_valid_hash("a\\b"));
    }
}
