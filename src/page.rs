//! Модель данных страниц: PageInfo (ключ хранения) и JSON-конверт страницы.
//!
//! Конверт:
//!   {"meta":{"next":"<token>|"},"data":{"header":{"columns":[...]},"records":[[...],...]}}
//!
//! Пустой `meta.next` - терминальная страница цепочки.

use serde::{Deserialize, Serialize};

/// Одна строка данных: ячейки в порядке колонок заголовка.
pub type Record = Vec<String>;

/// Терминальный next-токен.
pub const END_OF_CHAIN: &str = "";

/// Идентификация одной страницы в хранилище.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub dataset_hash: String,
    pub page_token: String,
    /// Форматы, приемлемые для клиента (после согласования), в порядке предпочтения.
    pub requested_content_types: Vec<String>,
    /// Страница уже распакована/сформирована в памяти: шаг decompress на чтении пропускается.
    pub is_already_compressed: bool,
}

impl PageInfo {
    pub fn new<H: Into<String>, T: Into<String>>(dataset_hash: H, page_token: T) -> Self {
        Self {
            dataset_hash: dataset_hash.into(),
            page_token: page_token.into(),
            ..Self::default()
        }
    }

    pub fn with_content_types(mut self, types: Vec<String>) -> Self {
        self.requested_content_types = types;
        self
    }

    pub fn with_already_compressed(mut self, on: bool) -> Self {
        self.is_already_compressed = on;
        self
    }
}

/// Объявление колонки из запроса на создание датасета.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Column {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, kind: K) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHeader {
    pub columns: Vec<ColumnHeader>,
}

impl PageHeader {
    /// Заголовок строится из деклараций запроса, не из содержимого записей.
    pub fn from_columns(cols: &[Column]) -> Self {
        let columns = cols
            .iter()
            .enumerate()
            .map(|(position, c)| ColumnHeader {
                name: c.name.clone(),
                kind: c.kind.clone(),
                position,
            })
            .collect();
        Self { columns }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub next: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    pub header: PageHeader,
    pub records: Vec<Record>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub meta: PageMeta,
    pub data: PageData,
}

impl Page {
    pub fn new(next: String, header: PageHeader, records: Vec<Record>) -> Self {
        Self {
            meta: PageMeta { next },
            data: PageData { header, records },
        }
    }

    pub fn next_token(&self) -> Option<&str> {
        if self.meta.next == END_OF_CHAIN {
            None
        } else {
            Some(&self.meta.next)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_token().is_none()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
