//! The `/Encrypt` dictionary as read by the standard security handler.

use crate::codec::crypt::CipherMode;
use crate::model::objects::{CosObject, Dict, Name};

/// Key length in bits when `/Length` is absent.
pub const DEFAULT_KEY_LENGTH: i64 = 40;

/// Fields of a standard-filter encryption dictionary.
///
/// Every field is optional in the file; entries of the wrong type are
/// treated as missing so that authentication fails closed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncryptionDict {
    /// `/Filter`, normally `Standard`.
    pub filter: Option<Name>,
    /// Algorithm version `/V`; 0 when absent.
    pub v: i64,
    /// Revision `/R`.
    pub r: Option<i64>,
    /// Key length in bits.
    pub length: i64,
    pub o: Option<Vec<u8>>,
    pub u: Option<Vec<u8>>,
    /// Owner key wrapped with the owner hash (revisions 5 and 6).
    pub oe: Option<Vec<u8>>,
    /// File key wrapped with the user hash (revisions 5 and 6).
    pub ue: Option<Vec<u8>>,
    /// Permission flags `/P`.
    pub p: Option<i64>,
    pub encrypt_metadata: bool,
    /// `/CFM` of the `/StdCF` crypt filter.
    pub std_cf_method: Option<Name>,
}

impl EncryptionDict {
    pub fn from_dict(dict: &Dict) -> Self {
        let bytes = |key: &str| {
            dict.get(key)
                .and_then(|obj| obj.as_string().ok())
                .map(|s| s.as_bytes().to_vec())
        };
        let int = |key: &str| dict.get(key).and_then(|obj| obj.as_int().ok());

        let std_cf_method = dict
            .get("CF")
            .and_then(|cf| cf.as_dict().ok())
            .and_then(|cf| cf.get("StdCF"))
            .and_then(|std_cf| std_cf.as_dict().ok())
            .and_then(|std_cf| std_cf.get("CFM"))
            .and_then(|cfm| cfm.as_name().ok())
            .map(Name::from);

        Self {
            filter: dict.get("Filter").and_then(|f| f.as_name().ok()).map(Name::from),
            v: int("V").unwrap_or(0),
            r: int("R"),
            length: int("Length").unwrap_or(DEFAULT_KEY_LENGTH),
            o: bytes("O"),
            u: bytes("U"),
            oe: bytes("OE"),
            ue: bytes("UE"),
            p: int("P"),
            encrypt_metadata: dict
                .get("EncryptMetadata")
                .and_then(|b| b.as_bool().ok())
                .unwrap_or(true),
            std_cf_method,
        }
    }

    /// RC4 unless `/V` is at least 4 and `/StdCF` names an AES method.
    pub fn cipher_mode(&self) -> CipherMode {
        match self.std_cf_method.as_deref() {
            Some("AESV2" | "AESV3") if self.v >= 4 => CipherMode::Aes,
            _ => CipherMode::Rc4,
        }
    }
}

impl From<&Dict> for EncryptionDict {
    fn from(dict: &Dict) -> Self {
        Self::from_dict(dict)
    }
}

/// First element of a trailer `/ID` array, if it is a string.
pub fn first_id(id: &CosObject) -> Option<&[u8]> {
    id.as_array()
        .ok()?
        .first()?
        .as_string()
        .ok()
        .map(|s| s.as_bytes())
}
