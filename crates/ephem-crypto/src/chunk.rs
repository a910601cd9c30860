//! Per-chunk XChaCha20-Poly1305 encryption/decryption
//!
//! Each chunk's nonce is derived from a per-envelope random base nonce:
//! the trailing 8 bytes are XORed with the chunk index (big-endian). The
//! note key is used by exactly one envelope, so (key, nonce) pairs never
//! repeat. Derived nonces are not stored per chunk — only the base nonce
//! travels in the envelope header region.
//!
//! ```text
//! AAD = format_version (1 byte) || chunk_index (8 bytes BE) || kind (1 byte)
//! kind: 0 = interior chunk, 1 = final chunk, 2 = envelope header
//! ```
//!
//! Binding the index prevents reordering, binding `Final` prevents dropping
//! trailing chunks, and binding the version prevents cross-version envelope
//! substitution.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use ephem_core::{EphemError, EphemResult};
use rand::{CryptoRng, RngCore};

use crate::keys::NoteKey;
use crate::{FORMAT_VERSION, NONCE_SIZE, TAG_SIZE};

/// Role of a block within the envelope, authenticated via the AAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// A body chunk with more chunks following
    Interior,
    /// The last body chunk of the envelope
    Final,
    /// The encrypted envelope header (always index 0)
    Header,
}

impl ChunkKind {
    fn as_byte(self) -> u8 {
        match self {
            ChunkKind::Interior => 0,
            ChunkKind::Final => 1,
            ChunkKind::Header => 2,
        }
    }
}

/// Generate the per-envelope random base nonce.
pub fn generate_base_nonce(rng: &mut (impl RngCore + CryptoRng)) -> EphemResult<[u8; NONCE_SIZE]> {
    let mut base = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut base).map_err(|_| EphemError::Entropy)?;
    Ok(base)
}

/// Derive the nonce for a chunk: base nonce with the trailing 8 bytes XORed
/// with the chunk index.
pub fn derive_nonce(base: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    let idx = index.to_be_bytes();
    for (n, i) in nonce[NONCE_SIZE - 8..].iter_mut().zip(idx) {
        *n ^= i;
    }
    nonce
}

fn build_aad(index: u64, kind: ChunkKind) -> [u8; 10] {
    let mut aad = [0u8; 10];
    aad[0] = FORMAT_VERSION;
    aad[1..9].copy_from_slice(&index.to_be_bytes());
    aad[9] = kind.as_byte();
    aad
}

/// Encrypt one chunk. Returns `[ciphertext][16-byte tag]`.
pub fn seal_chunk(
    key: &NoteKey,
    base_nonce: &[u8; NONCE_SIZE],
    index: u64,
    kind: ChunkKind,
    plaintext: &[u8],
) -> EphemResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce_bytes = derive_nonce(base_nonce, index);
    let nonce = XNonce::from_slice(&nonce_bytes);
    let aad = build_aad(index, kind);

    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| EphemError::Other(anyhow::anyhow!("chunk encryption failed: {e}")))
}

/// Decrypt one chunk. No plaintext is returned unless the tag verifies
/// against the expected index and kind.
pub fn open_chunk(
    key: &NoteKey,
    base_nonce: &[u8; NONCE_SIZE],
    index: u64,
    kind: ChunkKind,
    ciphertext: &[u8],
) -> EphemResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(EphemError::CorruptEnvelope(format!(
            "encrypted chunk too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext.len()
        )));
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce_bytes = derive_nonce(base_nonce, index);
    let nonce = XNonce::from_slice(&nonce_bytes);
    let aad = build_aad(index, kind);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| EphemError::Decryption)
}
