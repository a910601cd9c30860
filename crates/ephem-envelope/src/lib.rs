//! ephem-envelope: the opaque blob the relay stores
//!
//! Wire format, version 1:
//! ```text
//! [1 byte: format version]
//! [24 bytes: base nonce]
//! [4 bytes BE: header ciphertext length][header ciphertext + tag]
//! repeated body chunks:
//!   [4 bytes BE: chunk ciphertext length][chunk ciphertext + tag]
//! ```
//!
//! The header (payload kind, file names/mimes/sizes, body length, chunk
//! size) is itself encrypted — the relay sees nothing but lengths. Body
//! chunks are sealed at indices 1.., the last one marked final in its AAD.

pub mod payload;
pub mod wire;

pub use payload::{FileAttachment, FileMeta, NotePayload};
pub use wire::{seal, EnvelopeReader, OpenedPayload, SealOptions, SealSummary};

/// Default plaintext bytes per body chunk (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
