//! Standard security handler.
//!
//! Authenticates the empty user password, keeps the derived file key and
//! decrypts strings eagerly and streams lazily with the document's cipher.

use super::encryption::{EncryptionDict, first_id};
use super::key_derivation::{KeyDerivationParams, authenticate_user_password, object_key};
use crate::codec::crypt::{CipherMode, DecryptFilter};
use crate::config::ReaderOptions;
use crate::error::{PdfError, Result};
use crate::io::SeekableStream;
use crate::model::objects::{CosObject, CosStream, CosString, Dict, ObjectKey};
use once_cell::unsync::OnceCell;

/// Security handler for the `Standard` filter.
#[derive(Debug)]
pub struct StandardSecurityHandler {
    encryption: EncryptionDict,
    id: Option<Vec<u8>>,
    options: ReaderOptions,
    cipher_mode: CipherMode,
    /// File key when the empty password was accepted; set on first use.
    file_key: OnceCell<Option<Vec<u8>>>,
}

impl StandardSecurityHandler {
    /// `id` is the trailer `/ID` array; only its first string is used.
    pub fn new(encryption: Option<EncryptionDict>, id: Option<&CosObject>) -> Self {
        Self::with_options(encryption, id, ReaderOptions::default())
    }

    pub fn with_options(
        encryption: Option<EncryptionDict>,
        id: Option<&CosObject>,
        options: ReaderOptions,
    ) -> Self {
        let encryption = encryption.unwrap_or_default();
        let cipher_mode = encryption.cipher_mode();
        Self {
            id: id.and_then(first_id).map(<[u8]>::to_vec),
            encryption,
            options,
            cipher_mode,
            file_key: OnceCell::new(),
        }
    }

    pub fn from_dict(encrypt: &Dict, id: Option<&CosObject>) -> Self {
        Self::new(Some(EncryptionDict::from_dict(encrypt)), id)
    }

    pub fn encryption(&self) -> &EncryptionDict {
        &self.encryption
    }

    pub fn cipher_mode(&self) -> CipherMode {
        self.cipher_mode
    }

    /// Whether the empty string is the user password. Computed once.
    pub fn authenticate_empty_password(&self) -> bool {
        self.file_key
            .get_or_init(|| self.derive_empty_password_key())
            .is_some()
    }

    pub fn is_empty_password(&self) -> bool {
        self.authenticate_empty_password()
    }

    /// File key, or `None` when the empty password is not the user password.
    pub fn encryption_key(&self) -> Option<&[u8]> {
        self.file_key
            .get_or_init(|| self.derive_empty_password_key())
            .as_deref()
    }

    fn derive_empty_password_key(&self) -> Option<Vec<u8>> {
        let enc = &self.encryption;
        let (Some(o), Some(p), Some(id), Some(revision), Some(u)) =
            (&enc.o, enc.p, &self.id, enc.r, &enc.u)
        else {
            tracing::debug!("cannot authenticate password: encryption fields missing");
            return None;
        };

        let params = KeyDerivationParams {
            o: o.as_slice(),
            u: u.as_slice(),
            oe: enc.oe.as_deref(),
            ue: enc.ue.as_deref(),
            p,
            id: id.as_slice(),
            revision,
            encrypt_metadata: enc.encrypt_metadata,
            length: enc.length,
        };
        match authenticate_user_password(b"", &params) {
            Ok(Some(key)) => Some(key),
            Ok(None) => {
                tracing::debug!(revision, "empty password rejected");
                None
            }
            Err(err) => {
                tracing::debug!(revision, error = %err, "empty password authentication failed");
                None
            }
        }
    }

    /// Filter for the object `key` with the document's cipher.
    pub fn object_filter(&self, key: ObjectKey) -> Result<DecryptFilter> {
        let file_key = self.encryption_key().ok_or_else(|| {
            PdfError::Security("no decryption key: empty password not accepted".into())
        })?;
        Ok(DecryptFilter::new(
            self.cipher_mode,
            object_key(file_key, key, self.cipher_mode),
        ))
    }

    /// Decrypt `string`, which belongs to object `key`, in place.
    pub fn decrypt_string(&self, string: &mut CosString, key: ObjectKey) -> Result<()> {
        let filter = self.object_filter(key)?;
        let source = SeekableStream::from_bytes(string.as_bytes().to_vec());
        let decrypted = filter.drain(source, self.options.read_chunk)?;
        tracing::trace!(%key, len = decrypted.len(), "decrypted string");
        string.set_bytes(decrypted);
        Ok(())
    }

    /// Make reads of `stream`'s raw bytes decrypt on the fly.
    pub fn decrypt_stream(&self, stream: &mut CosStream, key: ObjectKey) -> Result<()> {
        if !self.encryption.encrypt_metadata
            && stream
                .get("Type")
                .and_then(|t| t.as_name().ok())
                .is_some_and(|t| t == "Metadata")
        {
            tracing::trace!(%key, "metadata stream left unencrypted");
            return Ok(());
        }
        stream.set_decrypt_filter(self.object_filter(key)?)
    }

    /// Decrypt every string in `obj`, recursing into arrays, dictionaries and
    /// stream dictionaries, and attach the stream filter to streams.
    pub fn decrypt_object(&self, obj: &mut CosObject, key: ObjectKey) -> Result<()> {
        match obj {
            CosObject::String(s) => self.decrypt_string(s, key),
            CosObject::Array(items) => items
                .iter_mut()
                .try_for_each(|item| self.decrypt_object(item, key)),
            CosObject::Dict(dict) => self.decrypt_dict(dict, key),
            CosObject::Stream(stream) => {
                self.decrypt_dict(&mut stream.dict, key)?;
                self.decrypt_stream(stream, key)
            }
            _ => Ok(()),
        }
    }

    fn decrypt_dict(&self, dict: &mut Dict, key: ObjectKey) -> Result<()> {
        dict.values_mut()
            .try_for_each(|value| self.decrypt_object(value, key))
    }
}
