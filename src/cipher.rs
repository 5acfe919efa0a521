//! Symmetric encryption of secret values under the deployment salt.
//!
//! Two on-wire formats coexist:
//!
//! - legacy: 3DES-EDE3 in ECB mode with PKCS#7 padding, keyed by the salt
//!   zero-padded or truncated to 24 bytes, base64 encoded. There is no IV,
//!   so equal plaintexts produce equal ciphertexts. Kept because existing
//!   deployments store every secret this way.
//! - `v2:` prefixed: AES-256-GCM keyed by SHA-256 of the salt, with a random
//!   96-bit nonce stored in front of the sealed bytes.
//!
//! [`decrypt`] accepts both; [`encrypt`] writes whichever [`CipherScheme`]
//! is configured.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use des::TdesEde3;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::digest::{SHA256, digest};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;

type TdesEcbEnc = ecb::Encryptor<TdesEde3>;
type TdesEcbDec = ecb::Decryptor<TdesEde3>;

pub const LEGACY_KEY_LEN: usize = 24;
const LEGACY_BLOCK_LEN: usize = 8;
const AEAD_PREFIX: &str = "v2:";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CipherScheme {
    #[default]
    Legacy,
    Aead,
}

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("salt must not be empty")]
    EmptyKey,
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext length {0} is not a multiple of the cipher block size")]
    BlockLength(usize),
    #[error("invalid padding (wrong salt or corrupted ciphertext)")]
    Padding,
    #[error("ciphertext is too short")]
    Truncated,
    #[error("authentication failed (wrong salt or corrupted ciphertext)")]
    Authentication,
    #[error("failed to generate nonce")]
    Random,
}

/// Encrypts `plaintext` with the salt and returns the transport string.
///
/// # Errors
/// Returns an error if the salt is empty or the nonce cannot be generated.
pub fn encrypt(plaintext: &[u8], salt: &str, scheme: CipherScheme) -> Result<String, CipherError> {
    match scheme {
        CipherScheme::Legacy => encrypt_legacy(plaintext, salt),
        CipherScheme::Aead => encrypt_aead(plaintext, salt),
    }
}

/// Decrypts a transport string produced by [`encrypt`] in either format.
///
/// # Errors
/// Returns an error on malformed base64, misaligned or truncated input, bad
/// padding, or failed authentication.
pub fn decrypt(ciphertext: &str, salt: &str) -> Result<Vec<u8>, CipherError> {
    match ciphertext.trim().strip_prefix(AEAD_PREFIX) {
        Some(payload) => decrypt_aead(payload, salt),
        None => decrypt_legacy(ciphertext.trim(), salt),
    }
}

fn legacy_key(salt: &str) -> Result<[u8; LEGACY_KEY_LEN], CipherError> {
    if salt.is_empty() {
        return Err(CipherError::EmptyKey);
    }
    let mut key = [0u8; LEGACY_KEY_LEN];
    let bytes = salt.as_bytes();
    let len = bytes.len().min(LEGACY_KEY_LEN);
    key[..len].copy_from_slice(&bytes[..len]);
    Ok(key)
}

fn encrypt_legacy(plaintext: &[u8], salt: &str) -> Result<String, CipherError> {
    let key = legacy_key(salt)?;
    let cipher = TdesEcbEnc::new(&key.into());
    let sealed = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    Ok(STANDARD.encode(sealed))
}

fn decrypt_legacy(ciphertext: &str, salt: &str) -> Result<Vec<u8>, CipherError> {
    let key = legacy_key(salt)?;
    let bytes = STANDARD.decode(ciphertext)?;
    if bytes.is_empty() || bytes.len() % LEGACY_BLOCK_LEN != 0 {
        return Err(CipherError::BlockLength(bytes.len()));
    }
    let cipher = TdesEcbDec::new(&key.into());
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
        .map_err(|_| CipherError::Padding)
}

fn aead_key(salt: &str) -> Result<LessSafeKey, CipherError> {
    if salt.is_empty() {
        return Err(CipherError::EmptyKey);
    }
    let hashed = digest(&SHA256, salt.as_bytes());
    let unbound =
        UnboundKey::new(&AES_256_GCM, hashed.as_ref()).map_err(|_| CipherError::EmptyKey)?;
    Ok(LessSafeKey::new(unbound))
}

fn encrypt_aead(plaintext: &[u8], salt: &str) -> Result<String, CipherError> {
    let key = aead_key(salt)?;
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| CipherError::Random)?;

    let mut sealed = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce),
        Aad::empty(),
        &mut sealed,
    )
    .map_err(|_| CipherError::Authentication)?;

    let mut payload = Vec::with_capacity(NONCE_LEN + sealed.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&sealed);
    Ok(format!("{AEAD_PREFIX}{}", STANDARD.encode(payload)))
}

fn decrypt_aead(payload: &str, salt: &str) -> Result<Vec<u8>, CipherError> {
    let key = aead_key(salt)?;
    let bytes = STANDARD.decode(payload)?;
    if bytes.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(CipherError::Truncated);
    }
    let (nonce, sealed) = bytes.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| CipherError::Truncated)?;
    let mut sealed = sealed.to_vec();
    let opened = key
        .open_in_place(nonce, Aad::empty(), &mut sealed)
        .map_err(|_| CipherError::Authentication)?;
    Ok(opened.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &str = "abcdefghijklmnopqrstuvwx";

    #[test]
    fn test_legacy_decrypts_known_vector() {
        let plain = decrypt("pa35K/WT6A4=", SALT).unwrap();
        assert_eq!(plain, b"secret");
    }

    #[test]
    fn test_legacy_pads_short_salt_with_zeros() {
        let plain = decrypt("KEUZ4fihqhXdyYrEVLY9hA==", "shortsalt").unwrap();
        assert_eq!(plain, b"ldap-password");
    }

    #[test]
    fn test_legacy_encrypt_is_deterministic() {
        let sealed = encrypt(b"secret", SALT, CipherScheme::Legacy).unwrap();
        assert_eq!(sealed, "pa35K/WT6A4=");
    }

    #[test]
    fn test_legacy_truncates_long_salt() {
        let long_salt = format!("{SALT}-ignored-tail");
        let plain = decrypt("pa35K/WT6A4=", &long_salt).unwrap();
        assert_eq!(plain, b"secret");
    }

    #[test]
    fn test_round_trip_both_schemes() {
        let message = b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        for scheme in [CipherScheme::Legacy, CipherScheme::Aead] {
            let sealed = encrypt(message, SALT, scheme).unwrap();
            assert_eq!(decrypt(&sealed, SALT).unwrap(), message);
        }
    }

    #[test]
    fn test_wrong_salt_never_yields_plaintext() {
        let message = b"the quick brown fox jumps";
        for scheme in [CipherScheme::Legacy, CipherScheme::Aead] {
            let sealed = encrypt(message, SALT, scheme).unwrap();
            // Legacy may unpad garbage by chance; it must never be the message.
            if let Ok(plain) = decrypt(&sealed, "zyxwvutsrqponmlkjihgfedc") {
                assert_ne!(plain, message);
            }
        }
    }

    #[test]
    fn test_aead_rejects_wrong_salt() {
        let sealed = encrypt(b"secret", SALT, CipherScheme::Aead).unwrap();
        let err = decrypt(&sealed, "another-salt").unwrap_err();
        assert!(matches!(err, CipherError::Authentication));
    }

    #[test]
    fn test_aead_uses_fresh_nonce() {
        let first = encrypt(b"secret", SALT, CipherScheme::Aead).unwrap();
        let second = encrypt(b"secret", SALT, CipherScheme::Aead).unwrap();
        assert!(first.starts_with(AEAD_PREFIX));
        assert_ne!(first, second);
    }

    #[test]
    fn test_rejects_malformed_base64() {
        let err = decrypt("not base64!!", SALT).unwrap_err();
        assert!(matches!(err, CipherError::Base64(_)));
    }

    #[test]
    fn test_rejects_misaligned_ciphertext() {
        let err = decrypt(&STANDARD.encode(b"12345"), SALT).unwrap_err();
        assert!(matches!(err, CipherError::BlockLength(5)));
    }

    #[test]
    fn test_rejects_empty_salt() {
        let err = decrypt("pa35K/WT6A4=", "").unwrap_err();
        assert!(matches!(err, CipherError::EmptyKey));
    }
}
