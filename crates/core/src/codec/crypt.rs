//! Decryption filters keyed by a per-object key.

use super::aes::AesDecryptReader;
use super::arcfour::Rc4Reader;
use crate::error::Result;
use std::fmt;
use std::io::{self, Read};

/// Which cipher family a document's standard security handler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// RC4 stream cipher.
    Rc4,
    /// AES-CBC block cipher with a 16-byte IV prefix.
    Aes,
}

/// A cipher mode bound to one object's key.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptFilter {
    mode: CipherMode,
    key: Vec<u8>,
}

impl DecryptFilter {
    pub fn new(mode: CipherMode, key: Vec<u8>) -> Self {
        Self { mode, key }
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Wrap `inner` so that reads yield decrypted bytes.
    pub fn wrap<R: Read>(&self, inner: R) -> Result<DecryptReader<R>> {
        Ok(match self.mode {
            CipherMode::Rc4 => DecryptReader::Rc4(Rc4Reader::new(inner, &self.key)?),
            CipherMode::Aes => DecryptReader::Aes(AesDecryptReader::new(inner, &self.key)?),
        })
    }

    /// Run `inner` through the filter to completion using reads of at most
    /// `chunk` bytes.
    pub fn drain<R: Read>(&self, inner: R, chunk: usize) -> Result<Vec<u8>> {
        let mut reader = self.wrap(inner)?;
        let mut buf = vec![0u8; chunk.max(1)];
        let mut out = Vec::new();
        loop {
            let n = match reader.read(&mut buf) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

impl fmt::Debug for DecryptFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptFilter")
            .field("mode", &self.mode)
            .field("key_len", &self.key.len())
            .finish()
    }
}

/// A reader decrypting with whichever cipher its filter selected.
pub enum DecryptReader<R> {
    Rc4(Rc4Reader<R>),
    Aes(AesDecryptReader<R>),
}

impl<R: Read> Read for DecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Rc4(reader) => reader.read(buf),
            Self::Aes(reader) => reader.read(buf),
        }
    }
}
