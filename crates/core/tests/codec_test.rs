//! Tests for the RC4 and AES codecs and the per-object decryption filter.

use carousel_core::SeekableStream;
use carousel_core::codec::{
    AesDecryptReader, Arcfour, CipherMode, DecryptFilter, Rc4Reader, aes_cbc_decrypt,
    aes_cbc_encrypt,
};
use std::io::Read;

fn rc4_hex(key: &[u8], plain: &[u8]) -> String {
    hex::encode(Arcfour::new(key).unwrap().process(plain))
}

#[test]
fn test_arcfour_key() {
    assert_eq!(rc4_hex(b"Key", b"Plaintext"), "bbf316e8d940af0ad3");
}

#[test]
fn test_arcfour_wiki() {
    assert_eq!(rc4_hex(b"Wiki", b"pedia"), "1021bf0420");
}

#[test]
fn test_arcfour_secret() {
    assert_eq!(rc4_hex(b"Secret", b"Attack at dawn"), "45a01f645fc35b383552544b9bf5");
}

#[test]
fn test_arcfour_rejects_bad_keys() {
    assert!(Arcfour::new(b"").unwrap_err().is_security_error());
    assert!(Arcfour::new(&[0u8; 257]).is_err());
}

#[test]
fn test_rc4_reader_matches_one_shot() {
    let plain: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 256) as u8).collect();
    let cipher = Arcfour::new(b"object key").unwrap().process(&plain);

    let mut reader = Rc4Reader::new(&cipher[..], b"object key").unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 37];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, plain);
}

const IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

#[test]
fn test_aes128_cbc_known_vector() {
    let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
    let plain = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    let cipher = aes_cbc_encrypt(&key, &IV, &plain).unwrap();
    assert_eq!(hex::encode(&cipher), "7649abac8119b246cee98e9b12e9197d");
    assert_eq!(aes_cbc_decrypt(&key, &IV, &cipher).unwrap(), plain);
}

#[test]
fn test_aes256_cbc_known_vector() {
    let key =
        hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4").unwrap();
    let plain = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    let cipher = aes_cbc_encrypt(&key, &IV, &plain).unwrap();
    assert_eq!(hex::encode(&cipher), "f58c4c04d6e5f1ba779eabfb5f7bfbd6");
}

fn iv_prefixed(key: &[u8], plain: &[u8]) -> Vec<u8> {
    let pad = 16 - plain.len() % 16;
    let mut padded = plain.to_vec();
    padded.extend(std::iter::repeat_n(pad as u8, pad));
    let mut out = IV.to_vec();
    out.extend(aes_cbc_encrypt(key, &IV, &padded).unwrap());
    out
}

#[test]
fn test_aes_reader_strips_iv_and_padding() {
    let key = [9u8; 16];
    for len in [0usize, 1, 15, 16, 17, 4095, 4096, 10_000] {
        let plain: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        let input = iv_prefixed(&key, &plain);
        let mut out = Vec::new();
        AesDecryptReader::new(&input[..], &key)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, plain, "length {len}");
    }
}

#[test]
fn test_aes_reader_rejects_trailing_bytes() {
    let key = [9u8; 16];
    let mut input = iv_prefixed(&key, b"payload");
    input.push(0);
    let mut out = Vec::new();
    let err = AesDecryptReader::new(&input[..], &key)
        .unwrap()
        .read_to_end(&mut out)
        .unwrap_err();
    assert!(carousel_core::PdfError::from(err).is_security_error());
}

#[test]
fn test_filter_drain_is_independent_of_chunk_size() {
    let key = [3u8; 32];
    let plain = b"stream data that spans several AES blocks".repeat(20);
    let input = iv_prefixed(&key, &plain);
    let filter = DecryptFilter::new(CipherMode::Aes, key.to_vec());
    for chunk in [1usize, 7, 16, 2048] {
        let out = filter
            .drain(SeekableStream::from_bytes(input.clone()), chunk)
            .unwrap();
        assert_eq!(out, plain, "chunk {chunk}");
    }
}

#[test]
fn test_filter_rejects_bad_key_length() {
    let filter = DecryptFilter::new(CipherMode::Aes, vec![0u8; 10]);
    let err = filter.drain(&b"0123456789abcdef"[..], 16).unwrap_err();
    assert!(err.is_security_error());
}
