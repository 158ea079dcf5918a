//! AES-CBC primitives and the streaming AES decryption reader.

use crate::error::{PdfError, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};
use std::io::{self, Read};

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes256CbcDec = Decryptor<aes::Aes256>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;
type Aes256CbcEnc = Encryptor<aes::Aes256>;

/// AES block size in bytes; also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Bytes of ciphertext pulled from the inner reader at a time.
const READ_CHUNK: usize = 4096;

/// CBC decryptor over a 128 or 256 bit key.
enum CbcDecryptor {
    Aes128(Aes128CbcDec),
    Aes256(Aes256CbcDec),
}

impl CbcDecryptor {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let invalid = |_| PdfError::Security(format!("invalid AES key length {}", key.len()));
        match key.len() {
            16 => Aes128CbcDec::new_from_slices(key, iv)
                .map(Self::Aes128)
                .map_err(invalid),
            32 => Aes256CbcDec::new_from_slices(key, iv)
                .map(Self::Aes256)
                .map_err(invalid),
            n => Err(PdfError::Security(format!(
                "AES key must be 16 or 32 bytes, got {n}"
            ))),
        }
    }

    fn decrypt_block(&mut self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(cipher) => cipher.decrypt_block_mut(block),
            Self::Aes256(cipher) => cipher.decrypt_block_mut(block),
        }
    }
}

fn check_blocks(iv: &[u8], data: &[u8]) -> Result<()> {
    if iv.len() != BLOCK_SIZE {
        return Err(PdfError::Security(format!(
            "AES IV must be 16 bytes, got {}",
            iv.len()
        )));
    }
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PdfError::Security(format!(
            "AES data length {} is not a multiple of 16",
            data.len()
        )));
    }
    Ok(())
}

/// Decrypt `data` with AES-CBC and no padding removal.
///
/// The key must be 16 (AES-128) or 32 (AES-256) bytes, the IV 16 bytes, and
/// the data a whole number of blocks.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_blocks(iv, data)?;
    let mut cipher = CbcDecryptor::new(key, iv)?;
    let mut buf = data.to_vec();
    for block in buf.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(block);
    }
    Ok(buf)
}

/// Encrypt `data` with AES-CBC and no padding.
///
/// The key must be 16 or 32 bytes, the IV 16 bytes, and the data a whole
/// number of blocks.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_blocks(iv, data)?;
    let invalid = |_| PdfError::Security(format!("invalid AES key length {}", key.len()));
    let mut buf = data.to_vec();
    match key.len() {
        16 => {
            let mut cipher = Aes128CbcEnc::new_from_slices(key, iv).map_err(invalid)?;
            for block in buf.chunks_exact_mut(BLOCK_SIZE) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }
        32 => {
            let mut cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(invalid)?;
            for block in buf.chunks_exact_mut(BLOCK_SIZE) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
        }
        n => {
            return Err(PdfError::Security(format!(
                "AES key must be 16 or 32 bytes, got {n}"
            )));
        }
    }
    Ok(buf)
}

/// Remove PKCS#7 padding from AES-decrypted data.
///
/// Returns data unchanged if padding is invalid:
/// - Padding byte value is 0 or > 16
/// - Not enough bytes for claimed padding
/// - Padding bytes are not all equal to the padding length
pub fn unpad_aes(data: &[u8]) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return data;
    }
    let start = data.len() - pad_len;
    if data[start..].iter().any(|&byte| byte as usize != pad_len) {
        return data;
    }
    &data[..start]
}

/// Decrypting reader for `IV || AES-CBC(plaintext || padding)` input.
///
/// The first 16 bytes of `inner` are the IV. Ciphertext is decrypted block by
/// block; the final block is held back until end of input so its padding can
/// be stripped. Input shorter than one IV is passed through unchanged.
pub struct AesDecryptReader<R> {
    inner: R,
    key: Vec<u8>,
    cipher: Option<CbcDecryptor>,
    pending: Vec<u8>,
    plain: Vec<u8>,
    plain_pos: usize,
    eof: bool,
}

impl<R: Read> AesDecryptReader<R> {
    pub fn new(inner: R, key: &[u8]) -> Result<Self> {
        if key.len() != 16 && key.len() != 32 {
            return Err(PdfError::Security(format!(
                "AES key must be 16 or 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Self {
            inner,
            key: key.to_vec(),
            cipher: None,
            pending: Vec::new(),
            plain: Vec::new(),
            plain_pos: 0,
            eof: false,
        })
    }

    fn refill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        while self.plain_pos >= self.plain.len() && !self.eof {
            let n = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&chunk[..n]);
            }
            self.plain.clear();
            self.plain_pos = 0;

            if self.cipher.is_none() {
                if self.pending.len() < BLOCK_SIZE {
                    if self.eof {
                        self.plain = std::mem::take(&mut self.pending);
                    }
                    continue;
                }
                let iv: Vec<u8> = self.pending.drain(..BLOCK_SIZE).collect();
                self.cipher = Some(CbcDecryptor::new(&self.key, &iv)?);
            }

            if self.eof && self.pending.len() % BLOCK_SIZE != 0 {
                return Err(PdfError::Security(format!(
                    "AES ciphertext has {} trailing bytes past the last block",
                    self.pending.len() % BLOCK_SIZE
                )));
            }
            let mut usable = self.pending.len() / BLOCK_SIZE * BLOCK_SIZE;
            if !self.eof && usable == self.pending.len() {
                usable = usable.saturating_sub(BLOCK_SIZE);
            }
            if let Some(cipher) = self.cipher.as_mut() {
                for block in self.pending[..usable].chunks_exact_mut(BLOCK_SIZE) {
                    cipher.decrypt_block(block);
                    self.plain.extend_from_slice(block);
                }
            }
            self.pending.drain(..usable);
            if self.eof {
                let keep = unpad_aes(&self.plain).len();
                self.plain.truncate(keep);
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for AesDecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.refill().map_err(PdfError::into_io)?;
        let available = &self.plain[self.plain_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.plain_pos += n;
        Ok(n)
    }
}
