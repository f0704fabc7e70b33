//! Согласование типа контента для выдачи страниц.
//!
//! Сейчас поддерживается только application/json; таблица renderers -
//! точка расширения под другие форматы.

use crate::error::{ProxyError, Result};

pub const APPLICATION_JSON: &str = "application/json";

const SUPPORTED: &[&str] = &[APPLICATION_JSON];

pub fn supported_types() -> Vec<String> {
    SUPPORTED.iter().map(|s| s.to_string()).collect()
}

/// Пересечение заявленных клиентом типов с поддерживаемыми, в порядке клиента.
/// Значения сравниваются без регистра, без пробелов и без параметров (`;charset=...`).
pub fn negotiate<'a, I>(declared: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<String> = Vec::new();
    for value in declared {
        for part in value.split(',') {
            let media = part.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            if SUPPORTED.contains(&media.as_str()) && !out.contains(&media) {
                out.push(media);
            }
        }
    }
    out
}

/// Превратить сырой payload страницы в тело ответа выбранного типа.
pub fn render(content_type: &str, raw: &[u8]) -> Result<Vec<u8>> {
    match content_type {
        APPLICATION_JSON => Ok(raw.to_vec()),
        _ => Err(ProxyError::UnsupportedContentType(supported_types())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation() {
        assert_eq!(negotiate(["application/json"]), vec![APPLICATION_JSON]);
        assert_eq!(negotiate([" Application/JSON; charset=utf-8 "]), vec![APPLICATION_JSON]);
        assert_eq!(negotiate(["text/xml, application/json"]), vec![APPLICATION_JSON]);
        assert!(negotiate(["text/xml"]).is_empty());
        assert!(negotiate(std::iter::empty::<&str>()).is_empty());
    }

    #[test]
    fn render_json_passthrough() {
        assert_eq!(render(APPLICATION_JSON, b"{}").unwrap(), b"{}");
        assert!(render("text/xml", b"{}").is_err());
    }
}
