//! ephem-crypto: client-side encryption for zero-knowledge note sharing
//!
//! Architecture: one random key per note, XChaCha20-Poly1305 everywhere
//!
//! ```text
//! Note Key (256-bit random, lives only in the URL fragment)
//!   ├── optional password wrap: Argon2id(password, salt) → wrap key
//!   │   └── XChaCha20-Poly1305 over the raw note key
//!   └── chunk AEAD: XChaCha20-Poly1305
//!       nonce  = base_nonce XOR chunk_index  (base random per envelope)
//!       AAD    = format_version || chunk_index || chunk_kind
//! ```
//!
//! The AAD binds each chunk to its position, its finality, and the envelope
//! format version, so reordering, truncation, and cross-version substitution
//! all fail tag verification.

pub mod chunk;
pub mod kdf;
pub mod keys;

pub use chunk::{derive_nonce, generate_base_nonce, open_chunk, seal_chunk, ChunkKind};
pub use kdf::{derive_wrap_key, KdfParams, WrapKey};
pub use keys::{generate_note_key, unwrap_note_key, wrap_note_key, NoteKey, PasswordWrap};

/// Size of a note key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of an Argon2id salt
pub const SALT_SIZE: usize = 16;

/// Envelope wire format version, bound into every chunk's AAD
pub const FORMAT_VERSION: u8 = 1;
