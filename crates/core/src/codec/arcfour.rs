//! Arcfour (RC4) stream cipher.
//!
//! Supports variable-length keys (1-256 bytes); PDF uses 5-16 byte keys.

use crate::error::{PdfError, Result};
use std::io::{self, Read};

/// RC4 keystream state.
#[derive(Clone, Debug)]
pub struct Arcfour {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Arcfour {
    /// Create a cipher keyed with `key`, which must be 1-256 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() || key.len() > 256 {
            return Err(PdfError::Security(format!(
                "RC4 key must be 1-256 bytes, got {}",
                key.len()
            )));
        }

        let mut state: [u8; 256] = std::array::from_fn(|i| i as u8);

        // Key-scheduling algorithm (KSA)
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, j as usize);
        }

        Ok(Self { state, i: 0, j: 0 })
    }

    /// Encrypt/decrypt data (RC4 is symmetric).
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter().map(|byte| byte ^ self.prga()).collect()
    }

    /// XOR the keystream into `data`.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.prga();
        }
    }

    /// Pseudo-random generation algorithm (PRGA).
    fn prga(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);
        self.state.swap(self.i as usize, self.j as usize);

        let idx = self.state[self.i as usize].wrapping_add(self.state[self.j as usize]);
        self.state[idx as usize]
    }
}

/// Decrypting reader applying the RC4 keystream to everything read from
/// `inner`.
pub struct Rc4Reader<R> {
    inner: R,
    cipher: Arcfour,
}

impl<R: Read> Rc4Reader<R> {
    pub fn new(inner: R, key: &[u8]) -> Result<Self> {
        Ok(Self {
            inner,
            cipher: Arcfour::new(key)?,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Rc4Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply(&mut buf[..n]);
        Ok(n)
    }
}
