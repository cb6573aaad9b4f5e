use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; every token starts with an IV of this many bytes.
pub const CONTENT_IV_BYTES: usize = 16;

const CONTENT_KEY_BYTES: usize = 32;
const TOKEN_SEPARATOR: char = ':';

#[derive(Debug, Error)]
/// Errors produced while decoding or decrypting a stored content token.
pub enum CodecError {
    #[error("invalid hex in content token: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("content token IV must be {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },
    #[error("cipher rejected key or IV length")]
    InvalidCipherInput,
    #[error("ciphertext padding is invalid")]
    InvalidPadding,
    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Encrypts and decrypts entry bodies for at-rest storage.
///
/// The key is `SHA-256(secret)`, accepting operator secrets of any length.
#[derive(Clone)]
pub struct ContentCodec {
    key: [u8; CONTENT_KEY_BYTES],
}

impl std::fmt::Debug for ContentCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentCodec([REDACTED])")
    }
}

impl ContentCodec {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; CONTENT_KEY_BYTES];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypts `plaintext` into a `hex(iv):hex(ciphertext)` token.
    ///
    /// Empty input is returned unchanged so absent content stays absent.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut iv = [0u8; CONTENT_IV_BYTES];
        rand::thread_rng().fill_bytes(&mut iv);

        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|_| CodecError::InvalidCipherInput)?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!(
            "{}{}{}",
            hex::encode(iv),
            TOKEN_SEPARATOR,
            hex::encode(ciphertext)
        ))
    }

    /// Decrypts a stored token back to plaintext.
    ///
    /// Input without the two-part `iv:ciphertext` structure is returned
    /// unchanged — entries written before encryption was introduced are
    /// stored as plaintext. A malformed ciphertext that happens to lack the
    /// separator is therefore also passed through; accepted legacy-tolerance
    /// tradeoff.
    pub fn decrypt(&self, stored: &str) -> Result<String, CodecError> {
        if stored.is_empty() {
            return Ok(String::new());
        }

        let Some((iv_hex, ciphertext_hex)) = stored.split_once(TOKEN_SEPARATOR) else {
            return Ok(stored.to_string());
        };

        let iv = hex::decode(iv_hex)?;
        if iv.len() != CONTENT_IV_BYTES {
            return Err(CodecError::InvalidIvLength {
                expected: CONTENT_IV_BYTES,
                actual: iv.len(),
            });
        }
        let ciphertext = hex::decode(ciphertext_hex)?;

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| CodecError::InvalidCipherInput)?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CodecError::InvalidPadding)?;

        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> ContentCodec {
        ContentCodec::new("test-secret")
    }

    #[test]
    fn round_trips_plaintext() {
        let codec = codec();
        let token = codec.encrypt("a quiet morning entry").expect("encrypt");
        assert_ne!(token, "a quiet morning entry");
        assert_eq!(codec.decrypt(&token).expect("decrypt"), "a quiet morning entry");
    }

    #[test]
    fn round_trips_unicode() {
        let codec = codec();
        let body = "réflexions du soir — 今日の日記 🌙";
        let token = codec.encrypt(body).expect("encrypt");
        assert_eq!(codec.decrypt(&token).expect("decrypt"), body);
    }

    #[test]
    fn empty_input_is_a_no_op_both_ways() {
        let codec = codec();
        assert_eq!(codec.encrypt("").expect("encrypt"), "");
        assert_eq!(codec.decrypt("").expect("decrypt"), "");
    }

    #[test]
    fn fresh_iv_per_call() {
        let codec = codec();
        let first = codec.encrypt("same plaintext").expect("encrypt");
        let second = codec.encrypt("same plaintext").expect("encrypt");
        assert_ne!(first, second);

        let (first_iv, _) = first.split_once(':').expect("token shape");
        let (second_iv, _) = second.split_once(':').expect("token shape");
        assert_ne!(first_iv, second_iv);
    }

    #[test]
    fn token_shape_is_hex_iv_and_hex_ciphertext() {
        let codec = codec();
        let token = codec.encrypt("shape check").expect("encrypt");
        let (iv_hex, ciphertext_hex) = token.split_once(':').expect("token shape");
        assert_eq!(iv_hex.len(), CONTENT_IV_BYTES * 2);
        assert!(iv_hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!ciphertext_hex.is_empty());
        assert!(ciphertext_hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn legacy_plaintext_without_separator_passes_through() {
        let codec = codec();
        assert_eq!(
            codec.decrypt("not-encrypted-plain-text").expect("decrypt"),
            "not-encrypted-plain-text"
        );
    }

    #[test]
    fn malformed_two_part_token_is_an_error() {
        let codec = codec();
        assert!(codec.decrypt("zz:zz").is_err());
        assert!(codec.decrypt("abcd:ef01").is_err());
    }

    #[test]
    fn different_secret_fails_to_decrypt() {
        let token = ContentCodec::new("secret-a")
            .encrypt("cross-key read")
            .expect("encrypt");
        let result = ContentCodec::new("secret-b").decrypt(&token);
        // Wrong key yields either a padding failure or garbage bytes; both
        // must surface as an error or a non-matching string, never the
        // original plaintext.
        match result {
            Ok(recovered) => assert_ne!(recovered, "cross-key read"),
            Err(_) => {}
        }
    }
}
