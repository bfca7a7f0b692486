//! The standard security handler (spec §6 "Security" is an opaque
//! collaborator interface; this module is the one concrete implementation
//! of it pdfkit ships). Covers RC4 key derivation for encryption
//! dictionary revisions 2-4 (ISO 32000-1 Algorithms 3.2 and 3.1) — AES
//! crypt filters and revision 5/6 (AES-256) key derivation are out of
//! scope, per spec §1's "full encryption" Non-goal.
//!
//! Grounded on the teacher's `crypt.rs`, which never compiled (a missing
//! comma in its padding table, an unterminated `decrypt` match); this
//! rewrites the same algorithm to completion behind a trait so a document
//! with no `/Encrypt` entry never has to think about it.

use crate::error::{self, Result};
use crate::object::{Dictionary, PlainRef, Primitive};

/// Padding appended to (or used in place of) a user password shorter than
/// 32 bytes (ISO 32000-1 Algorithm 3.2 step a).
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Decrypts/encrypts stream and string bytes given the object identifying
/// them. Implemented by [`StandardSecurityHandler`]; a document with no
/// `/Encrypt` entry never constructs one.
pub trait EncryptionHandler {
    fn decrypt(&self, id: PlainRef, data: &[u8]) -> Result<Vec<u8>>;
    fn encrypt(&self, id: PlainRef, data: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Clone, Debug)]
pub struct StandardSecurityHandler {
    file_key: Vec<u8>,
    revision: i64,
}

impl StandardSecurityHandler {
    /// Derives the file encryption key from an `/Encrypt` dictionary and a
    /// password (empty for the common "owner didn't set one" case),
    /// following Algorithm 3.2. `id0` is the first element of the
    /// trailer's `/ID` array.
    pub fn from_encrypt_dict(dict: &Dictionary, id0: &[u8], password: &[u8]) -> Result<StandardSecurityHandler> {
        let o = field_string(dict, "O")?;
        let p = field_integer(dict, "P")? as i32;
        let r = field_integer(dict, "R")?;
        let length_bits = match dict.get("Length") {
            Some(p) => p.clone().as_integer()?,
            None => 40,
        };
        let key_len = (length_bits / 8) as usize;
        let encrypt_metadata = match dict.get("EncryptMetadata") {
            Some(Primitive::Bool(b)) => *b,
            _ => true,
        };

        let mut input = Vec::with_capacity(32 + o.len() + 4 + id0.len() + 4);
        if password.len() >= 32 {
            input.extend_from_slice(&password[..32]);
        } else {
            input.extend_from_slice(password);
            input.extend_from_slice(&PADDING[..32 - password.len()]);
        }
        input.extend_from_slice(&o[..o.len().min(32)]);
        input.extend_from_slice(&p.to_le_bytes());
        input.extend_from_slice(id0);
        if r >= 4 && !encrypt_metadata {
            input.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        }

        let mut digest = md5::compute(&input).0;
        if r >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..key_len.min(16)]).0;
            }
        }

        let file_key = digest[..key_len.min(16)].to_vec();
        Ok(StandardSecurityHandler { file_key, revision: r })
    }

    /// Per-object key (Algorithm 3.1): the file key extended with the
    /// object/generation numbers and re-hashed, truncated to `key_len+5`
    /// (capped at 16) bytes.
    fn object_key(&self, id: PlainRef) -> Vec<u8> {
        let mut input = self.file_key.clone();
        input.extend_from_slice(&id.id.to_le_bytes()[..3]);
        input.extend_from_slice(&id.gen.to_le_bytes()[..2]);
        let digest = md5::compute(&input).0;
        let len = (self.file_key.len() + 5).min(16);
        digest[..len].to_vec()
    }
}

impl EncryptionHandler for StandardSecurityHandler {
    fn decrypt(&self, id: PlainRef, data: &[u8]) -> Result<Vec<u8>> {
        if self.revision > 4 {
            return error::OtherSnafu { reason: "AES-256 (revision 5/6) decryption is not implemented".to_string() }.fail();
        }
        Ok(rc4(&self.object_key(id), data))
    }

    fn encrypt(&self, id: PlainRef, data: &[u8]) -> Result<Vec<u8>> {
        // RC4 is a symmetric stream cipher; encryption is the same
        // operation as decryption.
        self.decrypt(id, data)
    }
}

fn field_string(dict: &Dictionary, key: &'static str) -> Result<Vec<u8>> {
    dict.get(key)
        .ok_or_else(|| error::MissingEntrySnafu { typ: "Encrypt", field: key }.build())?
        .as_string()
        .map(|s| s.to_vec())
}

fn field_integer(dict: &Dictionary, key: &'static str) -> Result<i64> {
    dict.get(key)
        .ok_or_else(|| error::MissingEntrySnafu { typ: "Encrypt", field: key }.build())?
        .as_integer()
}

/// RC4 keystream generation and XOR, used for the one crypt-filter
/// combination (`V1`/`V2`) the standard handler actually supports.
fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }
    let mut out = Vec::with_capacity(data.len());
    let (mut i, mut j) = (0u8, 0u8);
    for &byte in data {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        let k = s[(s[i as usize].wrapping_add(s[j as usize])) as usize];
        out.push(byte ^ k);
    }
    out
}

/// Looks up the trailer's `/ID` first element, defaulting to an empty
/// string for documents (rare, but legal before PDF 1.4) that omit it.
pub fn trailer_id0(id: &Option<Vec<crate::object::PdfString>>) -> Vec<u8> {
    id.as_ref().and_then(|v| v.first()).map(|s| s.as_bytes().to_vec()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc4_round_trips() {
        let key = b"secretkey";
        let data = b"the quick brown fox";
        let encrypted = rc4(key, data);
        let decrypted = rc4(key, &encrypted);
        assert_eq!(decrypted, data);
    }

    #[test]
    fn derives_a_16_byte_key_for_128_bit_rc4() {
        let mut dict = Dictionary::new();
        dict.insert("O", Primitive::String(vec![0u8; 32]));
        dict.insert("P", Primitive::Integer(-4));
        dict.insert("R", Primitive::Integer(3));
        dict.insert("Length", Primitive::Integer(128));
        let handler = StandardSecurityHandler::from_encrypt_dict(&dict, b"ID0", b"").unwrap();
        assert_eq!(handler.file_key.len(), 16);
    }
}
