//! Источник непрозрачных уникальных токенов (dataset hash, page token, request id).

use uuid::Uuid;

/// Новый токен: строковое представление случайного UUID v4. Никогда не пустой.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_distinct_and_non_empty() {
        let set: HashSet<String> = (0..1000).map(|_| new_token()).collect();
        assert_eq!(set.len(), 1000);
        assert!(set.iter().all(|t| !t.is_empty()));
    }
}
