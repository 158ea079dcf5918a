//! Standard security handler key derivation.
//!
//! Revisions 2-4 derive the file key with MD5 and check it by recomputing
//! `/U` with RC4. Revisions 5 and 6 check a SHA-256 (R5) or iterated
//! SHA-2/AES (R6) password hash and unwrap the file key from `/UE`.

use crate::codec::aes::{aes_cbc_decrypt, aes_cbc_encrypt};
use crate::codec::arcfour::Arcfour;
use crate::codec::crypt::CipherMode;
use crate::error::{PdfError, Result};
use crate::model::objects::ObjectKey;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Password padding string.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Passwords for revisions 5 and 6 are truncated to this many bytes.
const MAX_UTF8_PASSWORD: usize = 127;

/// Encryption dictionary values the key derivation reads.
#[derive(Debug, Clone, Copy)]
pub struct KeyDerivationParams<'a> {
    pub o: &'a [u8],
    pub u: &'a [u8],
    pub oe: Option<&'a [u8]>,
    pub ue: Option<&'a [u8]>,
    pub p: i64,
    pub id: &'a [u8],
    pub revision: i64,
    pub encrypt_metadata: bool,
    /// Key length in bits.
    pub length: i64,
}

impl KeyDerivationParams<'_> {
    /// File key length in bytes for revisions 2-4.
    fn key_len(&self) -> usize {
        match self.revision {
            2 => 5,
            4 => 16,
            _ => (self.length / 8).clamp(5, 16) as usize,
        }
    }
}

/// Pad or truncate `password` to 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

/// File key for `password` (revisions 2-4).
pub fn compute_encryption_key(password: &[u8], params: &KeyDerivationParams<'_>) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(pad_password(password));
    context.consume(params.o);
    context.consume((params.p as u32).to_le_bytes());
    context.consume(params.id);
    if params.revision >= 4 && !params.encrypt_metadata {
        context.consume([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut result = context.finalize().0.to_vec();

    let n = params.key_len();
    if params.revision >= 3 {
        for _ in 0..50 {
            result = md5::compute(&result[..n]).0.to_vec();
        }
    }
    result.truncate(n);
    result
}

/// Expected `/U` for file key `key` (revisions 2-4). Only the first 16
/// bytes are significant from revision 3 on.
pub fn compute_u_value(key: &[u8], params: &KeyDerivationParams<'_>) -> Result<Vec<u8>> {
    if params.revision == 2 {
        return Ok(Arcfour::new(key)?.process(&PASSWORD_PADDING));
    }

    let mut context = md5::Context::new();
    context.consume(PASSWORD_PADDING);
    context.consume(params.id);
    let mut result = Arcfour::new(key)?.process(&context.finalize().0);
    for i in 1..20u8 {
        let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        result = Arcfour::new(&xor_key)?.process(&result);
    }
    let mut padded = result.clone();
    padded.extend_from_slice(&result);
    Ok(padded)
}

/// Password hash for revisions 5 and 6. `vector` is the 48-byte `/U` when
/// hashing an owner password.
pub fn password_hash(
    revision: i64,
    password: &[u8],
    salt: &[u8],
    vector: Option<&[u8]>,
) -> Result<Vec<u8>> {
    match revision {
        5 => {
            let mut hasher = Sha256::new();
            hasher.update(password);
            hasher.update(salt);
            if let Some(v) = vector {
                hasher.update(v);
            }
            Ok(hasher.finalize().to_vec())
        }
        6 => r6_hash(password, salt, vector),
        r => Err(PdfError::Security(format!(
            "no password hash for revision {r}"
        ))),
    }
}

fn r6_hash(password: &[u8], salt: &[u8], vector: Option<&[u8]>) -> Result<Vec<u8>> {
    let vector = vector.unwrap_or(&[]);
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(&salt[..salt.len().min(8)]);
    hasher.update(vector);
    let mut k = hasher.finalize().to_vec();

    let mut round = 0u32;
    let mut last = 0u8;
    while round < 64 || u32::from(last) + 32 > round {
        let block: Vec<u8> = [password, k.as_slice(), vector].concat();
        let k1 = block.repeat(64);
        let e = aes_cbc_encrypt(&k[..16], &k[16..32], &k1)?;

        // The first 16 bytes as a big-endian integer mod 3; 256 = 1 (mod 3).
        k = match e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        last = e[e.len() - 1];
        round += 1;
    }
    k.truncate(32);
    Ok(k)
}

/// File key if `password` is the user password, `None` otherwise.
pub fn authenticate_user_password(
    password: &[u8],
    params: &KeyDerivationParams<'_>,
) -> Result<Option<Vec<u8>>> {
    match params.revision {
        2..=4 => {
            let key = compute_encryption_key(password, params);
            let u = compute_u_value(&key, params)?;
            let matches = if params.revision == 2 {
                u == params.u
            } else {
                params.u.len() >= 16 && u[..16] == params.u[..16]
            };
            Ok(matches.then_some(key))
        }
        5 | 6 => {
            let Some(ue) = params.ue.filter(|ue| ue.len() >= 32) else {
                tracing::debug!("missing or short /UE");
                return Ok(None);
            };
            if params.u.len() < 48 {
                tracing::debug!(len = params.u.len(), "/U shorter than 48 bytes");
                return Ok(None);
            }
            let password = &password[..password.len().min(MAX_UTF8_PASSWORD)];
            let (hash, validation_salt, key_salt) =
                (&params.u[..32], &params.u[32..40], &params.u[40..48]);

            if password_hash(params.revision, password, validation_salt, None)? != hash {
                return Ok(None);
            }
            let wrapping_key = password_hash(params.revision, password, key_salt, None)?;
            aes_cbc_decrypt(&wrapping_key, &[0u8; 16], &ue[..32]).map(Some)
        }
        r => Err(PdfError::Security(format!("unsupported revision {r}"))),
    }
}

/// Per-object key. AES-256 file keys are used as is; otherwise the object
/// number and generation are mixed into the file key with MD5.
pub fn object_key(file_key: &[u8], key: ObjectKey, mode: CipherMode) -> Vec<u8> {
    if mode == CipherMode::Aes && file_key.len() == 32 {
        return file_key.to_vec();
    }
    let mut data = file_key.to_vec();
    data.extend_from_slice(&key.objid.to_le_bytes()[..3]);
    data.extend_from_slice(&u32::from(key.genno).to_le_bytes()[..2]);
    if mode == CipherMode::Aes {
        data.extend_from_slice(b"sAlT");
    }
    let n = (file_key.len() + 5).min(16);
    md5::compute(&data).0[..n].to_vec()
}
