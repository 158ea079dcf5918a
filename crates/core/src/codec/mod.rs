//! Cipher codecs used by the standard security handler.
//!
//! - `aes`: AES-CBC primitives and streaming decryption
//! - `arcfour`: RC4 keystream and streaming decryption
//! - `crypt`: per-object decryption filters

pub mod aes;
pub mod arcfour;
pub mod crypt;

pub use aes::{AesDecryptReader, aes_cbc_decrypt, aes_cbc_encrypt, unpad_aes};
pub use arcfour::{Arcfour, Rc4Reader};
pub use crypt::{CipherMode, DecryptFilter, DecryptReader};
