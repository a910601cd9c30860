//! ephem-client: everything between the envelope codec and the user
//!
//! The relay is an untrusted collaborator: it stores opaque envelopes and
//! enforces views/expiration. All key material stays on this side of the
//! `Relay` trait — the decryption key travels only in the URL fragment,
//! which compliant HTTP clients never transmit.

pub mod constraints;
pub mod open;
pub mod relay;
pub mod send;
pub mod url;

pub use constraints::check_constraints;
pub use open::open_note;
pub use relay::{HttpRelay, Relay};
pub use send::{send_note, SendOutcome};
pub use url::{decode_share_url, encode_share_url, KeyMaterial, ShareUrl};
