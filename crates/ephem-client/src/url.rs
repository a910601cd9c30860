//! Share URL encoding: `https://<relay>/<noteId>#<base64url key material>`
//!
//! The fragment is the only place key material appears. Its decoded length
//! distinguishes the two shapes: 32 bytes is a raw note key, 100 bytes is a
//! password wrap (salt + KDF params + wrapped key).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ephem_core::{EphemError, EphemResult};
use ephem_crypto::keys::PASSWORD_WRAP_LEN;
use ephem_crypto::{NoteKey, PasswordWrap, KEY_SIZE};
use url::Url;

/// Key material carried in the URL fragment.
pub enum KeyMaterial {
    Raw(NoteKey),
    Wrapped(PasswordWrap),
}

impl KeyMaterial {
    /// Whether opening this note needs a password.
    pub fn needs_password(&self) -> bool {
        matches!(self, KeyMaterial::Wrapped(_))
    }

    pub fn to_fragment(&self) -> String {
        match self {
            KeyMaterial::Raw(key) => URL_SAFE_NO_PAD.encode(key.as_bytes()),
            KeyMaterial::Wrapped(wrap) => URL_SAFE_NO_PAD.encode(wrap.to_bytes()),
        }
    }

    pub fn from_fragment(fragment: &str) -> EphemResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(fragment)
            .map_err(|e| EphemError::MalformedUrl(format!("fragment base64: {e}")))?;

        match bytes.len() {
            KEY_SIZE => {
                let mut key = [0u8; KEY_SIZE];
                key.copy_from_slice(&bytes);
                Ok(KeyMaterial::Raw(NoteKey::from_bytes(key)))
            }
            PASSWORD_WRAP_LEN => Ok(KeyMaterial::Wrapped(PasswordWrap::from_bytes(&bytes)?)),
            n => Err(EphemError::MalformedUrl(format!(
                "fragment decodes to {n} bytes, expected {KEY_SIZE} (raw key) or {PASSWORD_WRAP_LEN} (wrapped)"
            ))),
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Raw(_) => f.write_str("KeyMaterial::Raw([REDACTED])"),
            KeyMaterial::Wrapped(_) => f.write_str("KeyMaterial::Wrapped([REDACTED])"),
        }
    }
}

/// A fully parsed share URL.
#[derive(Debug)]
pub struct ShareUrl {
    /// Relay base URL, fragment and note id stripped
    pub base: Url,
    /// Server-assigned opaque note identifier
    pub note_id: String,
    pub key: KeyMaterial,
}

/// Build the shareable URL. The key lands exclusively in the fragment;
/// path and query never carry it.
pub fn encode_share_url(base: &Url, note_id: &str, key: &KeyMaterial) -> EphemResult<Url> {
    let mut url = base
        .join(note_id)
        .map_err(|e| EphemError::MalformedUrl(format!("joining note id: {e}")))?;
    url.set_fragment(Some(&key.to_fragment()));
    Ok(url)
}

/// Parse a share URL back into relay base, note id, and key material.
///
/// Fails fast — before any network or cryptographic work — on a missing
/// fragment, bad base64, or an unrecognized key-material shape.
pub fn decode_share_url(url: &Url) -> EphemResult<ShareUrl> {
    let fragment = url
        .fragment()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| EphemError::MalformedUrl("missing key fragment".into()))?;
    let key = KeyMaterial::from_fragment(fragment)?;

    let note_id = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EphemError::MalformedUrl("missing note id in path".into()))?
        .to_string();

    let mut base = url.clone();
    base.set_fragment(None);
    base.path_segments_mut()
        .map_err(|_| EphemError::MalformedUrl("relay URL cannot be a base".into()))?
        .pop();
    Ok(ShareUrl {
        base,
        note_id,
        key,
    })
}
