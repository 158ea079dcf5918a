//! Tests for the standard security handler.

use carousel_core::codec::{Arcfour, CipherMode, aes_cbc_encrypt};
use carousel_core::document::key_derivation::{
    KeyDerivationParams, authenticate_user_password, compute_encryption_key, compute_u_value,
    object_key, password_hash,
};
use carousel_core::model::{CosObject, CosStream, CosString, Dict, ObjectKey};
use carousel_core::{EncryptionDict, SeekableStream, StandardSecurityHandler};

// rc4-40.pdf: V=1, R=2, user password "baz", owner password "foo"
const RC4_40_O: [u8; 32] = [
    1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200, 22,
    149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
];
const RC4_40_U: [u8; 32] = [
    105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5, 208,
    231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
];

// rc4-128.pdf: V=2, R=3, same passwords
const RC4_128_O: [u8; 32] = [
    208, 72, 209, 82, 158, 83, 93, 24, 132, 205, 56, 86, 54, 123, 24, 75, 74, 144, 223, 1, 230, 55,
    209, 110, 202, 6, 91, 175, 78, 100, 144, 11,
];
const RC4_128_U: [u8; 32] = [
    9, 52, 18, 54, 59, 157, 50, 124, 122, 197, 1, 68, 199, 199, 85, 241, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0,
];

const DOCID: [u8; 16] = [
    101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
];

// aes-256.pdf: V=5, R=5, same passwords
const AES256_O: [u8; 48] = [
    197, 126, 60, 46, 218, 22, 190, 91, 132, 46, 198, 222, 145, 49, 111, 125, 24, 147, 223, 122, 6,
    21, 159, 78, 155, 195, 49, 220, 252, 161, 203, 182, 215, 56, 115, 236, 23, 247, 193, 14, 39,
    184, 210, 207, 56, 201, 114, 199,
];
const AES256_U: [u8; 48] = [
    179, 236, 138, 87, 238, 76, 63, 44, 188, 66, 38, 224, 89, 1, 136, 216, 233, 86, 206, 51, 43,
    103, 248, 173, 26, 183, 85, 55, 229, 239, 180, 149, 88, 136, 28, 124, 249, 186, 223, 59, 180,
    7, 178, 19, 84, 51, 249, 188,
];
const AES256_OE: [u8; 32] = [
    91, 206, 49, 194, 37, 90, 49, 81, 128, 220, 14, 148, 72, 121, 213, 222, 45, 98, 227, 35, 15,
    76, 191, 10, 54, 211, 184, 43, 81, 250, 80, 231,
];
const AES256_UE: [u8; 32] = [
    121, 209, 78, 72, 9, 195, 93, 96, 16, 97, 189, 216, 198, 84, 195, 205, 125, 73, 208, 81, 173,
    33, 196, 195, 9, 4, 57, 3, 226, 247, 31, 8,
];

fn string(bytes: &[u8]) -> CosObject {
    CosObject::String(CosString::literal(bytes.to_vec()))
}

fn id_array(id: &[u8]) -> CosObject {
    CosObject::Array(vec![string(id), string(id)])
}

fn crypt_filters(method: &str) -> CosObject {
    let mut std_cf = Dict::new();
    std_cf.insert("CFM".into(), CosObject::Name(method.into()));
    std_cf.insert("Length".into(), CosObject::Int(16));
    let mut cf = Dict::new();
    cf.insert("StdCF".into(), CosObject::Dict(std_cf));
    CosObject::Dict(cf)
}

fn rc4_params<'a>(revision: i64, o: &'a [u8], u: &'a [u8]) -> KeyDerivationParams<'a> {
    KeyDerivationParams {
        o,
        u,
        oe: None,
        ue: None,
        p: -4,
        id: &DOCID,
        revision,
        encrypt_metadata: true,
        length: if revision == 2 { 40 } else { 128 },
    }
}

/// An encryption dictionary whose user password is empty, built from
/// scratch with the key derivation functions.
struct Fixture {
    dict: Dict,
    file_key: Vec<u8>,
}

fn empty_password_fixture(
    v: i64,
    revision: i64,
    method: Option<&str>,
    encrypt_metadata: bool,
) -> Fixture {
    let o = [0x5Au8; 32];
    let length = match revision {
        2 => 40,
        _ => 128,
    };
    let params = KeyDerivationParams {
        o: &o,
        u: &[],
        oe: None,
        ue: None,
        p: -3904,
        id: &DOCID,
        revision,
        encrypt_metadata,
        length,
    };
    let file_key = compute_encryption_key(b"", &params);
    let u = compute_u_value(&file_key, &params).unwrap();

    let mut dict = Dict::new();
    dict.insert("Filter".into(), CosObject::Name("Standard".into()));
    dict.insert("V".into(), CosObject::Int(v));
    dict.insert("R".into(), CosObject::Int(revision));
    dict.insert("Length".into(), CosObject::Int(length));
    dict.insert("O".into(), string(&o));
    dict.insert("U".into(), string(&u));
    dict.insert("P".into(), CosObject::Int(-3904));
    if !encrypt_metadata {
        dict.insert("EncryptMetadata".into(), CosObject::Bool(false));
    }
    if let Some(method) = method {
        dict.insert("CF".into(), crypt_filters(method));
    }
    Fixture { dict, file_key }
}

/// Revision 6 dictionary with an empty user password wrapping `file_key`.
fn aes256_fixture(file_key: &[u8; 32]) -> Dict {
    let validation_salt = *b"vsalt123";
    let key_salt = *b"ksalt456";
    let mut u = password_hash(6, b"", &validation_salt, None).unwrap();
    u.extend_from_slice(&validation_salt);
    u.extend_from_slice(&key_salt);
    let wrapping_key = password_hash(6, b"", &key_salt, None).unwrap();
    let ue = aes_cbc_encrypt(&wrapping_key, &[0u8; 16], file_key).unwrap();

    let mut dict = Dict::new();
    dict.insert("Filter".into(), CosObject::Name("Standard".into()));
    dict.insert("V".into(), CosObject::Int(5));
    dict.insert("R".into(), CosObject::Int(6));
    dict.insert("Length".into(), CosObject::Int(256));
    dict.insert("O".into(), string(&[0u8; 48]));
    dict.insert("U".into(), string(&u));
    dict.insert("OE".into(), string(&[0u8; 32]));
    dict.insert("UE".into(), string(&ue));
    dict.insert("P".into(), CosObject::Int(-1028));
    dict.insert("CF".into(), crypt_filters("AESV3"));
    dict
}

fn rc4_encrypt(file_key: &[u8], key: ObjectKey, plain: &[u8]) -> Vec<u8> {
    let key = object_key(file_key, key, CipherMode::Rc4);
    Arcfour::new(&key).unwrap().process(plain)
}

fn aes_encrypt(file_key: &[u8], key: ObjectKey, iv: [u8; 16], plain: &[u8]) -> Vec<u8> {
    let key = object_key(file_key, key, CipherMode::Aes);
    let pad = 16 - plain.len() % 16;
    let mut padded = plain.to_vec();
    padded.extend(std::iter::repeat_n(pad as u8, pad));
    let mut out = iv.to_vec();
    out.extend(aes_cbc_encrypt(&key, &iv, &padded).unwrap());
    out
}

// --- Password checks against real documents ---

#[test]
fn test_rc4_40_user_password() {
    let params = rc4_params(2, &RC4_40_O, &RC4_40_U);
    let key = authenticate_user_password(b"baz", &params).unwrap().unwrap();
    assert_eq!(key.len(), 5);
    assert!(authenticate_user_password(b"", &params).unwrap().is_none());
    assert!(authenticate_user_password(b"foo", &params).unwrap().is_none());
}

#[test]
fn test_rc4_128_user_password() {
    let params = rc4_params(3, &RC4_128_O, &RC4_128_U);
    let key = authenticate_user_password(b"baz", &params).unwrap().unwrap();
    assert_eq!(key.len(), 16);
    assert!(authenticate_user_password(b"", &params).unwrap().is_none());
}

#[test]
fn test_aes256_user_password() {
    let params = KeyDerivationParams {
        o: &AES256_O,
        u: &AES256_U,
        oe: Some(&AES256_OE[..]),
        ue: Some(&AES256_UE[..]),
        p: -4,
        id: &[],
        revision: 5,
        encrypt_metadata: true,
        length: 256,
    };
    let key = authenticate_user_password(b"baz", &params).unwrap().unwrap();
    assert_eq!(key.len(), 32);
    assert!(authenticate_user_password(b"", &params).unwrap().is_none());
}

#[test]
fn test_password_protected_documents_reject_empty_password() {
    let mut dict = Dict::new();
    dict.insert("V".into(), CosObject::Int(2));
    dict.insert("R".into(), CosObject::Int(3));
    dict.insert("Length".into(), CosObject::Int(128));
    dict.insert("P".into(), CosObject::Int(-4));
    dict.insert("O".into(), string(&RC4_128_O));
    dict.insert("U".into(), string(&RC4_128_U));
    let handler = StandardSecurityHandler::from_dict(&dict, Some(&id_array(&DOCID)));
    assert!(!handler.authenticate_empty_password());
    assert!(handler.encryption_key().is_none());
}

#[test]
fn test_unsupported_revision_is_an_error() {
    let params = rc4_params(7, &RC4_40_O, &RC4_40_U);
    let err = authenticate_user_password(b"", &params).unwrap_err();
    assert!(err.is_security_error());
}

// --- Empty-password handlers ---

#[test]
fn test_empty_password_accepted_for_each_revision() {
    let cases = [
        (1, 2, None),
        (2, 3, None),
        (4, 4, Some("V2")),
        (4, 4, Some("AESV2")),
    ];
    for (v, revision, method) in cases {
        let fixture = empty_password_fixture(v, revision, method, true);
        let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
        assert!(handler.authenticate_empty_password(), "R{revision} {method:?}");
        assert!(handler.is_empty_password());
        assert_eq!(handler.encryption_key(), Some(fixture.file_key.as_slice()));
    }
}

#[test]
fn test_authentication_is_memoized() {
    let fixture = empty_password_fixture(2, 3, None, true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let first = handler.encryption_key().map(<[u8]>::as_ptr);
    assert!(handler.authenticate_empty_password());
    assert!(handler.authenticate_empty_password());
    assert_eq!(handler.encryption_key().map(<[u8]>::as_ptr), first);
}

#[test]
fn test_missing_fields_fail_closed() {
    let fixture = empty_password_fixture(2, 3, None, true);
    for field in ["O", "U", "P", "R"] {
        let mut dict = fixture.dict.clone();
        dict.shift_remove(field);
        let handler = StandardSecurityHandler::from_dict(&dict, Some(&id_array(&DOCID)));
        assert!(!handler.authenticate_empty_password(), "without /{field}");
        assert!(handler.encryption_key().is_none());
    }

    let handler = StandardSecurityHandler::from_dict(&fixture.dict, None);
    assert!(!handler.authenticate_empty_password());

    let handler = StandardSecurityHandler::new(None, Some(&id_array(&DOCID)));
    assert!(!handler.authenticate_empty_password());
}

#[test]
fn test_wrong_field_types_fail_closed() {
    let fixture = empty_password_fixture(2, 3, None, true);
    let mut dict = fixture.dict.clone();
    dict.insert("U".into(), CosObject::Int(0));
    let handler = StandardSecurityHandler::from_dict(&dict, Some(&id_array(&DOCID)));
    assert!(!handler.authenticate_empty_password());
}

#[test]
fn test_unsupported_revision_fails_closed() {
    let mut fixture = empty_password_fixture(2, 3, None, true);
    fixture.dict.insert("R".into(), CosObject::Int(9));
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    assert!(!handler.authenticate_empty_password());
}

#[test]
fn test_cipher_mode_selection() {
    let mode = |v, method: Option<&str>| {
        let mut dict = Dict::new();
        dict.insert("V".into(), CosObject::Int(v));
        if let Some(method) = method {
            dict.insert("CF".into(), crypt_filters(method));
        }
        StandardSecurityHandler::from_dict(&dict, None).cipher_mode()
    };
    assert_eq!(mode(2, None), CipherMode::Rc4);
    assert_eq!(mode(4, None), CipherMode::Rc4);
    assert_eq!(mode(4, Some("V2")), CipherMode::Rc4);
    assert_eq!(mode(4, Some("AESV2")), CipherMode::Aes);
    assert_eq!(mode(5, Some("AESV3")), CipherMode::Aes);
    assert_eq!(mode(2, Some("AESV2")), CipherMode::Rc4);
}

// --- Decryption ---

#[test]
fn test_rc4_string_round_trip() {
    let fixture = empty_password_fixture(2, 3, None, true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let key = ObjectKey::new(12, 0);
    let plain = b"Hello, encrypted world";
    let cipher = rc4_encrypt(&fixture.file_key, key, plain);

    let mut s = CosString::literal(cipher.clone());
    handler.decrypt_string(&mut s, key).unwrap();
    assert_eq!(s.as_bytes(), plain);

    // RC4 is symmetric: running the plaintext through again restores it
    handler.decrypt_string(&mut s, key).unwrap();
    assert_eq!(s.as_bytes(), cipher.as_slice());
}

#[test]
fn test_object_number_and_generation_change_the_key() {
    let fixture = empty_password_fixture(1, 2, None, true);
    let plain = b"same plaintext";
    let a = rc4_encrypt(&fixture.file_key, ObjectKey::new(1, 0), plain);
    let b = rc4_encrypt(&fixture.file_key, ObjectKey::new(2, 0), plain);
    let c = rc4_encrypt(&fixture.file_key, ObjectKey::new(1, 1), plain);
    assert_ne!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_large_object_number() {
    let fixture = empty_password_fixture(2, 3, None, true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let key = ObjectKey::new(0x00FF_FFFF, 65535);
    let mut s = CosString::literal(rc4_encrypt(&fixture.file_key, key, b"big"));
    handler.decrypt_string(&mut s, key).unwrap();
    assert_eq!(s.as_bytes(), b"big");
}

#[test]
fn test_aes128_string_round_trip() {
    let fixture = empty_password_fixture(4, 4, Some("AESV2"), true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    assert_eq!(handler.cipher_mode(), CipherMode::Aes);

    let key = ObjectKey::new(3, 0);
    for plain in [&b""[..], b"sixteen byte str", b"a longer string spanning blocks"] {
        let cipher = aes_encrypt(&fixture.file_key, key, [7u8; 16], plain);
        let mut s = CosString::hex(cipher, 0, true);
        handler.decrypt_string(&mut s, key).unwrap();
        assert_eq!(s.as_bytes(), plain);
    }
}

#[test]
fn test_aes_short_input_passes_through() {
    let fixture = empty_password_fixture(4, 4, Some("AESV2"), true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let mut s = CosString::literal(b"short".to_vec());
    handler.decrypt_string(&mut s, ObjectKey::new(1, 0)).unwrap();
    assert_eq!(s.as_bytes(), b"short");
}

#[test]
fn test_aes256_string_round_trip() {
    let file_key = [0x42u8; 32];
    let dict = aes256_fixture(&file_key);
    let handler = StandardSecurityHandler::from_dict(&dict, Some(&id_array(&DOCID)));
    assert!(handler.authenticate_empty_password());
    assert_eq!(handler.encryption_key(), Some(&file_key[..]));

    let key = ObjectKey::new(9, 0);
    let cipher = aes_encrypt(&file_key, key, [1u8; 16], b"AES-256 protected");
    let mut s = CosString::literal(cipher);
    handler.decrypt_string(&mut s, key).unwrap();
    assert_eq!(s.as_bytes(), b"AES-256 protected");
}

#[test]
fn test_stream_is_decrypted_lazily() {
    let fixture = empty_password_fixture(2, 3, None, true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let key = ObjectKey::new(4, 0);
    let plain = b"BT /F1 12 Tf (hi) Tj ET".repeat(200);
    let cipher = rc4_encrypt(&fixture.file_key, key, &plain);

    let mut stream = CosStream::new(Dict::new(), SeekableStream::from_bytes(cipher.clone()));
    handler.decrypt_stream(&mut stream, key).unwrap();
    assert!(stream.is_encrypted());
    assert_eq!(stream.read_raw().unwrap(), plain);
    // reads start over from the first byte each time
    assert_eq!(stream.read_raw().unwrap(), plain);

    let mut source = stream.data().source().share().unwrap();
    assert_eq!(source.read_remaining().unwrap(), cipher);
}

#[test]
fn test_aes_stream_round_trip() {
    let fixture = empty_password_fixture(4, 4, Some("AESV2"), true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let key = ObjectKey::new(8, 0);
    let plain: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
    let cipher = aes_encrypt(&fixture.file_key, key, [3u8; 16], &plain);

    let mut stream = CosStream::new(Dict::new(), SeekableStream::from_bytes(cipher));
    handler.decrypt_stream(&mut stream, key).unwrap();
    assert_eq!(stream.read_raw().unwrap(), plain);
}

#[test]
fn test_metadata_stream_left_alone_when_not_encrypted() {
    let fixture = empty_password_fixture(4, 4, Some("V2"), false);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    assert!(handler.authenticate_empty_password());
    assert!(!handler.encryption().encrypt_metadata);

    let mut dict = Dict::new();
    dict.insert("Type".into(), CosObject::Name("Metadata".into()));
    let mut metadata = CosStream::new(dict, SeekableStream::from_bytes(&b"<x:xmpmeta/>"[..]));
    handler.decrypt_stream(&mut metadata, ObjectKey::new(2, 0)).unwrap();
    assert!(!metadata.is_encrypted());
    assert_eq!(metadata.read_raw().unwrap(), b"<x:xmpmeta/>");

    let mut other = CosStream::new(Dict::new(), SeekableStream::from_bytes(&b"data"[..]));
    handler.decrypt_stream(&mut other, ObjectKey::new(3, 0)).unwrap();
    assert!(other.is_encrypted());
}

#[test]
fn test_decrypt_object_recurses() {
    let fixture = empty_password_fixture(2, 3, None, true);
    let handler = StandardSecurityHandler::from_dict(&fixture.dict, Some(&id_array(&DOCID)));
    let key = ObjectKey::new(6, 0);
    let enc = |plain: &[u8]| string(&rc4_encrypt(&fixture.file_key, key, plain));

    let mut inner = Dict::new();
    inner.insert("Title".into(), enc(b"title"));
    inner.insert("Count".into(), CosObject::Int(3));
    let mut outer = Dict::new();
    outer.insert("Info".into(), CosObject::Dict(inner));
    outer.insert("Names".into(), CosObject::Array(vec![enc(b"a"), enc(b"bc")]));

    let mut stream_dict = Dict::new();
    stream_dict.insert("Author".into(), enc(b"me"));
    let body = rc4_encrypt(&fixture.file_key, key, b"body");
    let stream = CosStream::new(stream_dict, SeekableStream::from_bytes(body));
    outer.insert("Data".into(), CosObject::Stream(Box::new(stream)));

    let mut obj = CosObject::Dict(outer);
    handler.decrypt_object(&mut obj, key).unwrap();

    let outer = obj.as_dict().unwrap();
    let info = outer["Info"].as_dict().unwrap();
    assert_eq!(info["Title"].as_bytes().unwrap(), b"title");
    assert_eq!(info["Count"], CosObject::Int(3));
    let names = outer["Names"].as_array().unwrap();
    assert_eq!(names[0].as_bytes().unwrap(), b"a");
    assert_eq!(names[1].as_bytes().unwrap(), b"bc");
    let stream = outer["Data"].as_stream().unwrap();
    assert_eq!(stream.get("Author").unwrap().as_bytes().unwrap(), b"me");
    assert_eq!(stream.read_raw().unwrap(), b"body");
}

#[test]
fn test_decrypt_without_key_is_an_error() {
    let handler = StandardSecurityHandler::new(Some(EncryptionDict::default()), None);
    let mut s = CosString::literal(b"secret".to_vec());
    let err = handler.decrypt_string(&mut s, ObjectKey::new(1, 0)).unwrap_err();
    assert!(err.is_security_error());
    assert_eq!(s.as_bytes(), b"secret");

    let mut stream = CosStream::new(Dict::new(), SeekableStream::from_bytes(&b"x"[..]));
    assert!(handler.decrypt_stream(&mut stream, ObjectKey::new(1, 0)).is_err());
    assert!(!stream.is_encrypted());
}
