//! Three-layer AES-128-CBC cascade keyed by the passphrase hash.
//!
//! Each layer has its own key stretched with PBKDF2-HMAC-SHA512 and its own
//! IV derived from the hash. The plaintext is padded once with a scheme that
//! always appends at least 17 identical bytes, which doubles as a coarse
//! integrity check on decryption.

use aes::Aes128;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor as CbcDecryptor, Encryptor as CbcEncryptor};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::memory::SecureBytes;
use crate::passphrase::Passphrase;
use crate::types::{SafeError, SafeResult, PASSPHRASE_HASH_SIZE};

type Aes128CbcEnc = CbcEncryptor<Aes128>;
type Aes128CbcDec = CbcDecryptor<Aes128>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

const KEY_SIZE: usize = 16;
const LAYERS: usize = 3;

// Per-layer key derivation parameters
const KEY_SALTS: [&[u8]; LAYERS] = [b"saltyN3SS&Whate", b"saltyN74G@337q8", b"saltyN99!14Ra12"];
const KEY_ITERATIONS: [u32; LAYERS] = [18_913, 23_944, 19_781];

const BASE_IV: [u8; BLOCK_SIZE] = [1, 1, 30, 1, 99, 2, 90, 1, 0, 2, 13, 32, 20, 3, 1, 70];

/// Keys and IVs for all three layers, zeroed when dropped.
///
/// Deriving the keys is deliberately slow, so callers that process several
/// payloads under one passphrase should build one cipher and reuse it.
pub struct LayeredCipher {
    keys: Vec<SecureBytes>,
    ivs: Vec<SecureBytes>,
}

impl LayeredCipher {
    /// Derive the layer material from a 64-byte passphrase hash
    pub fn from_secret(hash: &[u8]) -> SafeResult<Self> {
        if hash.len() != PASSPHRASE_HASH_SIZE {
            return Err(SafeError::Crypto(format!(
                "expected {} byte secret, got {}",
                PASSPHRASE_HASH_SIZE,
                hash.len()
            )));
        }

        // The stretched password is the upper-case hex of the hash
        let password = SecureBytes::new(hex::encode_upper(hash).into_bytes());

        let mut keys = Vec::with_capacity(LAYERS);
        let mut ivs = Vec::with_capacity(LAYERS);
        for layer in 0..LAYERS {
            let salt = layer_salt(layer, hash);
            keys.push(derive_key_pbkdf2(
                password.as_slice(),
                &salt,
                KEY_ITERATIONS[layer],
            )?);
            ivs.push(build_iv(layer + 1, hash));
        }

        Ok(Self { keys, ivs })
    }

    /// Derive the layer material from the secret held by `passphrase`.
    ///
    /// Fails with [`SafeError::PassphraseExpired`] when nothing is held.
    pub fn from_passphrase(passphrase: &Passphrase) -> SafeResult<Self> {
        let secret = passphrase.secret_hash()?;
        Self::from_secret(secret.as_slice())
    }

    /// Pad then encrypt through layers one, two and three
    pub fn encrypt(&self, plaintext: &[u8]) -> SafeResult<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        // Replaced layer buffers are wiped as they drop
        let mut data = Zeroizing::new(pad(plaintext));
        for (key, iv) in self.keys.iter().zip(&self.ivs) {
            let cipher = Aes128CbcEnc::new_from_slices(key.as_slice(), iv.as_slice())
                .map_err(|e| SafeError::Crypto(e.to_string()))?;
            data = Zeroizing::new(cipher.encrypt_padded_vec_mut::<NoPadding>(&data));
        }
        Ok(std::mem::take(&mut *data))
    }

    /// Decrypt through layers three, two and one, then strip the padding.
    ///
    /// Fails with [`SafeError::PaddingInvalid`] for a wrong key or modified
    /// ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> SafeResult<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(SafeError::PaddingInvalid);
        }

        let mut data = Zeroizing::new(ciphertext.to_vec());
        for (key, iv) in self.keys.iter().zip(&self.ivs).rev() {
            let cipher = Aes128CbcDec::new_from_slices(key.as_slice(), iv.as_slice())
                .map_err(|e| SafeError::Crypto(e.to_string()))?;
            data = Zeroizing::new(
                cipher
                    .decrypt_padded_vec_mut::<NoPadding>(&data)
                    .map_err(|_| SafeError::PaddingInvalid)?,
            );
        }

        unpad(&data).map(<[u8]>::to_vec)
    }
}

impl std::fmt::Debug for LayeredCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LayeredCipher(layers={})", self.keys.len())
    }
}

/// Encrypt `plaintext` under the secret currently held by `passphrase`
pub fn encrypt(passphrase: &Passphrase, plaintext: &[u8]) -> SafeResult<Vec<u8>> {
    LayeredCipher::from_passphrase(passphrase)?.encrypt(plaintext)
}

/// Decrypt `ciphertext` under the secret currently held by `passphrase`
pub fn decrypt(passphrase: &Passphrase, ciphertext: &[u8]) -> SafeResult<Vec<u8>> {
    LayeredCipher::from_passphrase(passphrase)?.decrypt(ciphertext)
}

/// Derive a layer key using PBKDF2-HMAC-SHA512
fn derive_key_pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> SafeResult<SecureBytes> {
    let mut key = SecureBytes::zeroed(KEY_SIZE);

    pbkdf2::<Hmac<Sha512>>(password, salt, iterations, key.as_mut_slice())
        .map_err(|e| SafeError::Crypto(e.to_string()))?;

    Ok(key)
}

/// Layer salt with bytes 1..=3 taken from the hash
fn layer_salt(layer: usize, hash: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut salt = Zeroizing::new(KEY_SALTS[layer].to_vec());
    salt[1] = hash[2];
    salt[2] = hash[10];
    salt[3] = hash[60] ^ hash[50];
    salt
}

/// IV for `level` (1-based), the base vector perturbed by hash bytes
fn build_iv(level: usize, hash: &[u8]) -> SecureBytes {
    let l = level;
    let mut iv = SecureBytes::from_slice(&BASE_IV);
    let bytes = iv.as_mut_slice();
    bytes[l] = hash[0];
    bytes[l + 1] = hash[10 * l];
    bytes[l + 3] = hash[16 * l];
    bytes[l + 5] = hash[1 + l] ^ hash[7 * l];
    bytes[l + 7] = hash[17 * l];
    bytes[l + 10] = hash[20 * l];
    bytes[l + 11] = hash[13 * l] ^ hash[7 - l];
    iv
}

/// Append `p + 16` copies of `p`, where `p = 16 - len % 16`
pub fn pad(data: &[u8]) -> Vec<u8> {
    let p = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(data.len() + p + BLOCK_SIZE);
    out.extend_from_slice(data);
    out.resize(data.len() + p + BLOCK_SIZE, p as u8);
    out
}

/// Strip padding added by [`pad`], verifying every padding byte
pub fn unpad(data: &[u8]) -> SafeResult<&[u8]> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(SafeError::PaddingInvalid);
    }

    let p = data[data.len() - 1] as usize;
    if p == 0 || p > BLOCK_SIZE {
        return Err(SafeError::PaddingInvalid);
    }

    let pad_len = p + BLOCK_SIZE;
    if pad_len > data.len() {
        return Err(SafeError::PaddingInvalid);
    }

    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != p) {
        return Err(SafeError::PaddingInvalid);
    }
    Ok(body)
}
