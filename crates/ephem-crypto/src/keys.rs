//! Note key generation and password wrapping
//!
//! Password wrap serialization (binary, 100 bytes):
//! ```text
//! [16 bytes: Argon2id salt]
//! [4 bytes: mem_cost_kib BE][4 bytes: time_cost BE][4 bytes: parallelism BE]
//! [24 bytes: nonce][32 bytes: wrapped key][16 bytes: Poly1305 tag]
//! ```
//!
//! The layout is fixed-width so its total decoded length (100) distinguishes
//! a wrapped key from a raw 32-byte key in a URL fragment.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use ephem_core::{EphemError, EphemResult};
use rand::{CryptoRng, RngCore};
use secrecy::SecretString;
use zeroize::Zeroize;

use crate::kdf::{derive_wrap_key, KdfParams};
use crate::{KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// nonce + wrapped key + tag
const WRAPPED_LEN: usize = NONCE_SIZE + KEY_SIZE + TAG_SIZE;

/// Total serialized size of a `PasswordWrap`
pub const PASSWORD_WRAP_LEN: usize = SALT_SIZE + 12 + WRAPPED_LEN;

/// Upper bounds on cost parameters accepted from a decoded fragment, so a
/// hostile URL cannot demand gigabytes of KDF memory.
const MAX_MEM_COST_KIB: u32 = 1 << 22;
const MAX_TIME_COST: u32 = 64;
const MAX_PARALLELISM: u32 = 64;

/// The per-note 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct NoteKey {
    bytes: [u8; KEY_SIZE],
}

impl NoteKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for NoteKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for NoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit note key from the supplied CSPRNG.
///
/// Entropy failure is fatal (`EphemError::Entropy`) and is never retried.
pub fn generate_note_key(rng: &mut (impl RngCore + CryptoRng)) -> EphemResult<NoteKey> {
    let mut bytes = [0u8; KEY_SIZE];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|_| EphemError::Entropy)?;
    Ok(NoteKey::from_bytes(bytes))
}

/// A note key encrypted under a password-derived wrap key, together with
/// everything the receiver needs to re-derive that wrap key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordWrap {
    pub salt: [u8; SALT_SIZE],
    pub params: KdfParams,
    /// `[nonce][ciphertext][tag]`, always `WRAPPED_LEN` bytes
    pub wrapped: Vec<u8>,
}

impl PasswordWrap {
    /// Fixed-width binary serialization for transport in a URL fragment.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PASSWORD_WRAP_LEN);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.params.mem_cost_kib.to_be_bytes());
        out.extend_from_slice(&self.params.time_cost.to_be_bytes());
        out.extend_from_slice(&self.params.parallelism.to_be_bytes());
        out.extend_from_slice(&self.wrapped);
        out
    }

    /// Parse a serialized wrap, rejecting wrong lengths and cost parameters
    /// outside the accepted range.
    pub fn from_bytes(data: &[u8]) -> EphemResult<Self> {
        if data.len() != PASSWORD_WRAP_LEN {
            return Err(EphemError::MalformedUrl(format!(
                "wrapped key material must be {PASSWORD_WRAP_LEN} bytes, got {}",
                data.len()
            )));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&data[..SALT_SIZE]);

        let be_u32 = |off: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[off..off + 4]);
            u32::from_be_bytes(b)
        };
        let params = KdfParams {
            mem_cost_kib: be_u32(SALT_SIZE),
            time_cost: be_u32(SALT_SIZE + 4),
            parallelism: be_u32(SALT_SIZE + 8),
        };

        if params.mem_cost_kib == 0
            || params.mem_cost_kib > MAX_MEM_COST_KIB
            || params.time_cost == 0
            || params.time_cost > MAX_TIME_COST
            || params.parallelism == 0
            || params.parallelism > MAX_PARALLELISM
        {
            return Err(EphemError::MalformedUrl(format!(
                "KDF cost parameters out of range: {params:?}"
            )));
        }

        Ok(Self {
            salt,
            params,
            wrapped: data[SALT_SIZE + 12..].to_vec(),
        })
    }
}

/// Wrap (encrypt) a note key under a password.
///
/// A fresh salt is drawn per wrap; the Argon2id-derived wrap key encrypts
/// the raw note key with XChaCha20-Poly1305.
pub fn wrap_note_key(
    key: &NoteKey,
    password: &SecretString,
    params: &KdfParams,
    rng: &mut (impl RngCore + CryptoRng),
) -> EphemResult<PasswordWrap> {
    let mut salt = [0u8; SALT_SIZE];
    rng.try_fill_bytes(&mut salt).map_err(|_| EphemError::Entropy)?;
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| EphemError::Entropy)?;

    let wrap_key = derive_wrap_key(password, &salt, params)?;
    let cipher = XChaCha20Poly1305::new(wrap_key.as_bytes().into());
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, key.as_bytes().as_ref())
        .map_err(|e| EphemError::Other(anyhow::anyhow!("key wrapping failed: {e}")))?;

    let mut wrapped = Vec::with_capacity(WRAPPED_LEN);
    wrapped.extend_from_slice(&nonce_bytes);
    wrapped.extend_from_slice(&ciphertext);

    Ok(PasswordWrap {
        salt,
        params: *params,
        wrapped,
    })
}

/// Unwrap (decrypt) a note key with a password.
///
/// Any tag failure — wrong password or corrupted wrap — surfaces as the
/// same `EphemError::Decryption`, never as silently wrong plaintext.
pub fn unwrap_note_key(wrap: &PasswordWrap, password: &SecretString) -> EphemResult<NoteKey> {
    if wrap.wrapped.len() != WRAPPED_LEN {
        return Err(EphemError::Decryption);
    }

    let wrap_key = derive_wrap_key(password, &wrap.salt, &wrap.params)?;
    let (nonce_bytes, ciphertext) = wrap.wrapped.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(wrap_key.as_bytes().into());

    let mut plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| EphemError::Decryption)?;

    if plaintext.len() != KEY_SIZE {
        plaintext.zeroize();
        return Err(EphemError::Decryption);
    }

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(NoteKey::from_bytes(key_bytes))
}
