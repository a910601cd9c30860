//! Key derivation: Argon2id password → wrap key

use std::time::Instant;

use argon2::{Algorithm, Argon2, Params, Version};
use ephem_core::{EphemError, EphemResult};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use zeroize::Zeroize;

use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a password, used only to wrap/unwrap a note
/// key. Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct WrapKey {
    bytes: [u8; KEY_SIZE],
}

impl WrapKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for WrapKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for WrapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters.
///
/// Stored alongside the wrapped key so the receiving side can re-derive the
/// wrap key from nothing but the password and the URL fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Derive a 256-bit wrap key from a password and salt using Argon2id.
///
/// The salt is random per wrap and travels with the wrapped key (it does not
/// need to be secret). Deliberately expensive to resist brute force.
pub fn derive_wrap_key(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> EphemResult<WrapKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| EphemError::Other(anyhow::anyhow!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let started = Instant::now();
    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| EphemError::Other(anyhow::anyhow!("Argon2id KDF failed: {e}")))?;
    debug!(
        mem_cost_kib = params.mem_cost_kib,
        time_cost = params.time_cost,
        parallelism = params.parallelism,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "wrap key derived"
    );

    Ok(WrapKey::from_bytes(key))
}
