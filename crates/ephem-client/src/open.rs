//! Open pipeline: decode URL → download → (unwrap) → envelope reader

use std::io::Cursor;

use ephem_core::{EphemError, EphemResult};
use ephem_crypto::unwrap_note_key;
use ephem_envelope::EnvelopeReader;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::relay::Relay;
use crate::url::{decode_share_url, KeyMaterial};

/// Fetch and authenticate a shared note, returning a reader positioned
/// after the decrypted header.
///
/// URL parsing happens before any network traffic, and the relay only ever
/// receives the note id — never the fragment. A password is required iff
/// the fragment carries a wrapped key.
pub async fn open_note<R: Relay>(
    relay: &R,
    url: &Url,
    password: Option<&SecretString>,
) -> EphemResult<EnvelopeReader<Cursor<Vec<u8>>>> {
    let share = decode_share_url(url)?;

    let key = match (&share.key, password) {
        (KeyMaterial::Raw(key), _) => key.clone(),
        (KeyMaterial::Wrapped(wrap), Some(password)) => unwrap_note_key(wrap, password)?,
        (KeyMaterial::Wrapped(_), None) => {
            return Err(EphemError::Constraint(
                "this note is password-protected".into(),
            ));
        }
    };

    let envelope = relay.get_note(&share.note_id).await?;
    debug!(note_id = %share.note_id, bytes = envelope.len(), "envelope downloaded");

    EnvelopeReader::new(Cursor::new(envelope), &key)
}
