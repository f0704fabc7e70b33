//! codec - чистые байтовые преобразования страниц (сжатие + AEAD).
//!
//! Порядок фиксирован:
//! - запись: compress -> encrypt
//! - чтение: decrypt -> decompress
//!
//! Каждая стадия опциональна и определяется StoreConfig (compression / cipher).
//! Состояния нет: функции и PageCipher можно свободно шарить между потоками.

use thiserror::Error;

pub mod aead;
pub mod compress;

pub use aead::{PageCipher, NONCE_LEN, TAG_LEN};
pub use compress::{compress, decompress, decompress_into, Compression};

/// Ошибки codec-слоя. Текст намеренно общий: детали шифра наружу не уходят.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Ключ неподдерживаемой длины (ожидается 16 или 32 байта).
    #[error("cipher key must be 16 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Тег не сошёлся, blob обрезан или повреждён.
    #[error("page authentication failed")]
    AuthFailure,

    /// Не удалось зашифровать (внутренняя ошибка AEAD).
    #[error("page encryption failed")]
    SealFailure,

    /// Ошибка потока сжатия/распаковки.
    #[error("compression stream: {0}")]
    Compression(#[from] std::io::Error),
}
