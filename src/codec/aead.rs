//! codec/aead - AES-GCM для страниц кэша.
//!
//! Формат blob:
//!   [nonce 12][ciphertext || tag 16]
//!
//! Nonce = 12 случайных байт (rand::rngs::OsRng) на КАЖДЫЙ вызов seal.
//! AAD не используется: ключ хранилища один на процесс.
//! Длина ключа выбирает вариант: 16 байт -> AES-128-GCM, 32 байта -> AES-256-GCM.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use super::CodecError;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Clone)]
pub enum PageCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl PageCipher {
    /// Построить шифр из сырого ключа. Вызывающий сам обнуляет `key` после вызова.
    pub fn new(key: &[u8]) -> Result<Self, CodecError> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(PageCipher::Aes128)
                .map_err(|_| CodecError::InvalidKeyLength(key.len())),
            32 => Aes256Gcm::new_from_slice(key)
                .map(PageCipher::Aes256)
                .map_err(|_| CodecError::InvalidKeyLength(key.len())),
            n => Err(CodecError::InvalidKeyLength(n)),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            PageCipher::Aes128(_) => "aes-128-gcm",
            PageCipher::Aes256(_) => "aes-256-gcm",
        }
    }

    /// Зашифровать: nonce || ciphertext || tag.
    pub fn seal(&self, plain: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let n = Nonce::from_slice(&nonce);

        let ct = match self {
            PageCipher::Aes128(c) => c.encrypt(n, plain),
            PageCipher::Aes256(c) => c.encrypt(n, plain),
        }
        .map_err(|_| CodecError::SealFailure)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
        Ok(out)
    }

    /// Расшифровать blob из seal. Любая порча/обрезка -> AuthFailure, без частичных данных.
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>, CodecError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::AuthFailure);
        }
        let (nonce, ct) = blob.split_at(NONCE_LEN);
        let n = Nonce::from_slice(nonce);
        match self {
            PageCipher::Aes128(c) => c.decrypt(n, ct),
            PageCipher::Aes256(c) => c.decrypt(n, ct),
        }
        .map_err(|_| CodecError::AuthFailure)
    }
}

// Ключевой материал в Debug не выводим.
impl fmt::Debug for PageCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageCipher({})", self.algorithm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_length_selects_variant() {
        assert_eq!(PageCipher::new(&[7u8; 16]).unwrap().algorithm(), "aes-128-gcm");
        assert_eq!(PageCipher::new(&[7u8; 32]).unwrap().algorithm(), "aes-256-gcm");
        assert!(matches!(
            PageCipher::new(&[7u8; 24]),
            Err(CodecError::InvalidKeyLength(24))
        ));
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let c = PageCipher::new(&[0x22u8; 32]).unwrap();
        let a = c.seal(b"same page").unwrap();
        let b = c.seal(b"same page").unwrap();
        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
        assert_eq!(c.open(&a).unwrap(), b"same page");
        assert_eq!(c.open(&b).unwrap(), b"same page");
    }

    #[test]
    fn truncated_blob_fails_closed() {
        let c = PageCipher::new(&[0x22u8; 16]).unwrap();
        let blob = c.seal(b"payload").unwrap();
        for cut in [0, 5, NONCE_LEN, NONCE_LEN + TAG_LEN - 1, blob.len() - 1] {
            assert!(matches!(c.open(&blob[..cut]), Err(CodecError::AuthFailure)));
        }
    }

    #[test]
    fn wrong_key_fails_closed() {
        let a = PageCipher::new(&[1u8; 32]).unwrap();
        let b = PageCipher::new(&[2u8; 32]).unwrap();
        let blob = a.seal(b"payload").unwrap();
        assert!(matches!(b.open(&blob), Err(CodecError::AuthFailure)));
    }
}
