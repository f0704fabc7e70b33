//! Источники записей для пагинации.
//!
//! Оба источника - ленивые итераторы `anyhow::Result<Record>`: Paginator
//! тянет записи по одной и не держит весь датасет в памяти.

pub mod csv_file;
pub mod mock;

pub use csv_file::CsvSource;
pub use mock::{MockColumn, MockSource};
