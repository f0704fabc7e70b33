//! Генератор случайных записей по описанию колонок (маршрут /create).
//!
//! Типы: string | int | float (регистр не важен). Любой другой тип даёт
//! ячейку "Unsupported Type". Границы int/float нормализуются по порядку.

use rand::Rng;
use serde::Deserialize;

use crate::page::{Column, Record};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz012346789";
pub const UNSUPPORTED_CELL: &str = "Unsupported Type";
/// Верхняя граница max_length для строковых колонок.
pub const MAX_STRING_LENGTH: usize = 64 * 1024;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MockColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub max_length: usize,
    #[serde(default)]
    pub int_lower_bound: i64,
    #[serde(default)]
    pub int_upper_bound: i64,
    #[serde(default)]
    pub float_lower_bound: f64,
    #[serde(default)]
    pub float_upper_bound: f64,
}

impl MockColumn {
    pub fn column(&self) -> Column {
        Column::new(self.name.clone(), self.kind.clone())
    }

    /// Проверить параметры, пришедшие из запроса.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_length > MAX_STRING_LENGTH {
            anyhow::bail!(
                "column '{}': max_length {} exceeds {}",
                self.name,
                self.max_length,
                MAX_STRING_LENGTH
            );
        }
        Ok(())
    }
}

/// Ровно `count` случайных записей.
pub struct MockSource<R> {
    columns: Vec<MockColumn>,
    remaining: usize,
    rng: R,
}

impl MockSource<rand::rngs::ThreadRng> {
    pub fn new(columns: Vec<MockColumn>, count: usize) -> Self {
        Self::with_rng(columns, count, rand::thread_rng())
    }
}

impl<R: Rng> MockSource<R> {
    pub fn with_rng(columns: Vec<MockColumn>, count: usize, rng: R) -> Self {
        Self {
            columns,
            remaining: count,
            rng,
        }
    }

    fn record(&mut self) -> Record {
        let mut out = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let cell = match col.kind.to_ascii_lowercase().as_str() {
                "string" => random_string(&mut self.rng, col.max_length),
                "int" => random_int(&mut self.rng, col.int_lower_bound, col.int_upper_bound).to_string(),
                "float" => {
                    random_float(&mut self.rng, col.float_lower_bound, col.float_upper_bound).to_string()
                }
                _ => UNSUPPORTED_CELL.to_string(),
            };
            out.push(cell);
        }
        out
    }
}

impl<R: Rng> Iterator for MockSource<R> {
    type Item = anyhow::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(Ok(self.record()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Длина в [0, max_len), max_len не больше MAX_STRING_LENGTH.
fn random_string<R: Rng>(rng: &mut R, max_len: usize) -> String {
    let max_len = max_len.min(MAX_STRING_LENGTH);
    if max_len == 0 {
        return String::new();
    }
    let len = rng.gen_range(0..max_len);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Значение в [lo, hi); при lo == hi - ровно lo.
fn random_int<R: Rng>(rng: &mut R, lo: i64, hi: i64) -> i64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if lo == hi {
        return lo;
    }
    rng.gen_range(lo..hi)
}

fn random_float<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    if lo == hi {
        return lo;
    }
    lo + rng.gen::<f64>() * (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn col(kind: &str) -> MockColumn {
        MockColumn {
            name: kind.into(),
            kind: kind.into(),
            max_length: 8,
            int_lower_bound: 10,
            int_upper_bound: -10,
            float_lower_bound: 1.5,
            float_upper_bound: 2.5,
        }
    }

    #[test]
    fn yields_exactly_count_records_in_column_order() {
        let cols = vec![col("INT"), col("string"), col("Float"), col("blob")];
        let src = MockSource::with_rng(cols, 25, StdRng::seed_from_u64(7));
        let recs: Vec<Record> = src.map(|r| r.unwrap()).collect();
        assert_eq!(recs.len(), 25);
        for r in &recs {
            assert_eq!(r.len(), 4);
            let i: i64 = r[0].parse().unwrap();
            assert!((-10..10).contains(&i));
            assert!(r[1].len() < 8);
            let f: f64 = r[2].parse().unwrap();
            assert!((1.5..=2.5).contains(&f));
            assert_eq!(r[3], UNSUPPORTED_CELL);
        }
    }

    #[test]
    fn degenerate_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_int(&mut rng, 5, 5), 5);
        assert_eq!(random_float(&mut rng, -1.0, -1.0), -1.0);
        assert_eq!(random_string(&mut rng, 0), "");
        let v = random_int(&mut rng, -3, -9);
        assert!((-9..-3).contains(&v));
    }

    #[test]
    fn string_length_is_bounded() {
        let mut c = col("string");
        c.max_length = MAX_STRING_LENGTH;
        assert!(c.validate().is_ok());
        c.max_length = 1 << 40;
        assert!(c.validate().is_err());

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..8 {
            assert!(random_string(&mut rng, usize::MAX).len() < MAX_STRING_LENGTH);
        }
    }
}
