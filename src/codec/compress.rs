//! Сжатие страниц: gzip (исходное поведение `--zip`) или zstd.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use anyhow::anyhow;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Deserialize;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Алгоритм сжатия страниц. `None` - хранить как есть.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl Compression {
    pub fn is_enabled(self) -> bool {
        self != Compression::None
    }
}

impl FromStr for Compression {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "off" => Ok(Compression::None),
            "gzip" | "gz" | "on" => Ok(Compression::Gzip),
            "zstd" => Ok(Compression::Zstd),
            other => Err(anyhow!("invalid compression '{}': use none|gzip|zstd", other)),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        };
        f.write_str(s)
    }
}

/// Сжать байты выбранным алгоритмом. Для `None` возвращается копия.
pub fn compress(kind: Compression, data: &[u8]) -> std::io::Result<Vec<u8>> {
    match kind {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut enc = GzEncoder::new(
                Vec::with_capacity(data.len() / 2 + 32),
                flate2::Compression::default(),
            );
            enc.write_all(data)?;
            enc.finish()
        }
        Compression::Zstd => zstd::bulk::compress(data, 0),
    }
}

/// Распаковать `data` в `out` (out предварительно очищается).
/// Позволяет переиспользовать scratch-буфер воркера между запросами.
pub fn decompress_into(kind: Compression, data: &[u8], out: &mut Vec<u8>) -> std::io::Result<()> {
    out.clear();
    match kind {
        Compression::None => {
            out.extend_from_slice(data);
        }
        Compression::Gzip => {
            let mut dec = GzDecoder::new(data);
            dec.read_to_end(out)?;
        }
        Compression::Zstd => {
            let mut dec = ZstdDecoder::new(data)?;
            dec.read_to_end(out)?;
        }
    }
    Ok(())
}

pub fn decompress(kind: Compression, data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress_into(kind, data, &mut out)?;
    Ok(out)
}
