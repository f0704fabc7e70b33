//! CSV-файл как источник записей (маршрут /existing).

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::page::Record;

pub struct CsvSource {
    records: csv::StringRecordsIntoIter<File>,
}

impl CsvSource {
    /// Открыть файл. `has_header` - пропустить первую строку.
    pub fn open(path: &Path, has_header: bool) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .from_reader(file);
        Ok(Self {
            records: reader.into_records(),
        })
    }
}

impl Iterator for CsvSource {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = self.records.next()?;
        Some(
            rec.map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| anyhow!("error reading file record: {}", e)),
        )
    }
}

/// Разрешить имя файла из запроса. Если задан `root`, путь обязан лежать внутри него.
pub fn resolve_source_path(file_name: &str, root: Option<&Path>) -> Result<PathBuf> {
    if file_name.trim().is_empty() {
        return Err(anyhow!("file_name must not be empty"));
    }
    let Some(root) = root else {
        return Ok(PathBuf::from(file_name));
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("ingest root {}", root.display()))?;
    let candidate = Path::new(file_name);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = joined
        .canonicalize()
        .with_context(|| format!("open {}", file_name))?;
    if !resolved.starts_with(&root) {
        return Err(anyhow!("file '{}' is outside the ingest root", file_name));
    }
    Ok(resolved)
}
