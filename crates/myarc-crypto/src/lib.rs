//! Symmetric at-rest encryption for entry bodies.
//!
//! Entry content is stored as `hex(iv):hex(ciphertext)` produced by
//! AES-256-CBC with a fresh random IV per call. The key is derived by hashing
//! the configured secret, so operators may supply a secret of any length.

mod content_codec;

pub use content_codec::{CodecError, ContentCodec, CONTENT_IV_BYTES};
