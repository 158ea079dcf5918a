//! Document-level security.
//!
//! This module contains:
//! - `encryption` - the `/Encrypt` dictionary fields
//! - `key_derivation` - standard password and key algorithms
//! - `security` - the standard security handler

pub mod encryption;
pub mod key_derivation;
pub mod security;

pub use encryption::EncryptionDict;
pub use key_derivation::{KeyDerivationParams, PASSWORD_PADDING};
pub use security::StandardSecurityHandler;
