//! Request-level error taxonomy and its HTTP status mapping.

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed request body, bad parameters, unreadable source file.
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown hash/token or a page that never materialized. Cause is not disclosed.
    #[error("invalid request or page token")]
    InvalidPageReference,

    #[error("internal failure handling page")]
    CorruptOrTamperedPage,

    #[error("storage unavailable")]
    StorageUnavailable,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Only {0} methods are accepted")]
    MethodNotAllowed(&'static str),

    #[error("Supported content types are: {}", .0.join(", "))]
    UnsupportedContentType(Vec<String>),

    #[error("not found")]
    NotFound,

    /// Unexpected fault caught at the request boundary.
    #[error("Request error")]
    Internal,
}

impl ProxyError {
    /// Internal faults stay in the 400 class, like every other dispatch failure.
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::InvalidInput(_)
            | ProxyError::InvalidPageReference
            | ProxyError::CorruptOrTamperedPage
            | ProxyError::StorageUnavailable
            | ProxyError::Internal => 400,
            ProxyError::Unauthorized(_) => 401,
            ProxyError::NotFound => 404,
            ProxyError::MethodNotAllowed(_) => 405,
            ProxyError::UnsupportedContentType(_) => 415,
        }
    }
}

impl From<StoreError> for ProxyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidPageReference => ProxyError::InvalidPageReference,
            StoreError::CorruptOrTamperedPage => ProxyError::CorruptOrTamperedPage,
            StoreError::StorageUnavailable(_) => ProxyError::StorageUnavailable,
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        ProxyError::InvalidInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(ProxyError::InvalidInput("x".into()).status(), 400);
        assert_eq!(ProxyError::Unauthorized("no".into()).status(), 401);
        assert_eq!(ProxyError::MethodNotAllowed("POST").status(), 405);
        assert_eq!(ProxyError::UnsupportedContentType(vec![]).status(), 415);
        assert_eq!(ProxyError::Internal.status(), 400);
    }

    #[test]
    fn unsupported_type_lists_supported() {
        let e = ProxyError::UnsupportedContentType(vec!["application/json".into()]);
        assert_eq!(e.to_string(), "Supported content types are: application/json");
    }

    #[test]
    fn store_errors_stay_generic() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire at /secret/path");
        let e: ProxyError = StoreError::StorageUnavailable(io).into();
        assert_eq!(e.to_string(), "storage unavailable");
    }
}
