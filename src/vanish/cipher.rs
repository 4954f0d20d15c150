//! Authenticated symmetric encryption of vanishing data.

use sodiumoxide::crypto::secretbox;

use crate::{Error, Result};

/// Size of the symmetric key, and of the secret split into shares.
pub const KEY_SIZE: usize = secretbox::KEYBYTES;

/// A fresh random key.
pub fn generate_key() -> secretbox::Key {
    init();
    secretbox::gen_key()
}

pub fn key_from_slice(bytes: &[u8]) -> Result<secretbox::Key> {
    secretbox::Key::from_slice(bytes).ok_or(Error::Decryption)
}

/// Encrypt under a random nonce, returns `nonce || sealed box`.
pub fn encrypt(key: &secretbox::Key, plaintext: &[u8]) -> Vec<u8> {
    init();

    let nonce = secretbox::gen_nonce();
    let sealed = secretbox::seal(plaintext, &nonce, key);

    let mut ciphertext = Vec::with_capacity(secretbox::NONCEBYTES + sealed.len());
    ciphertext.extend_from_slice(&nonce.0);
    ciphertext.extend_from_slice(&sealed);

    ciphertext
}

/// Decrypt `nonce || sealed box`, fails if truncated or tampered with.
pub fn decrypt(key: &secretbox::Key, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < secretbox::NONCEBYTES {
        return Err(Error::Decryption);
    }

    let (nonce, sealed) = ciphertext.split_at(secretbox::NONCEBYTES);
    let nonce = secretbox::Nonce::from_slice(nonce).ok_or(Error::Decryption)?;

    secretbox::open(sealed, &nonce, key).map_err(|_| Error::Decryption)
}

fn init() {
    // Idempotent, and only fails if the system has no randomness source.
    let _ = sodiumoxide::init();
}
