//! Send pipeline: validate → seal → (wrap) → upload → share URL

use ephem_core::{EphemResult, ShareConstraints};
use ephem_crypto::{generate_note_key, wrap_note_key, KdfParams};
use ephem_envelope::{seal, NotePayload, SealOptions, SealSummary};
use rand::rngs::OsRng;
use secrecy::SecretString;
use tracing::{debug, info};
use url::Url;

use crate::constraints::check_constraints;
use crate::relay::Relay;
use crate::url::{encode_share_url, KeyMaterial};

#[derive(Debug)]
pub struct SendOutcome {
    pub url: Url,
    pub note_id: String,
    pub summary: SealSummary,
}

/// Encrypt `payload` under a fresh key and store it on the relay.
///
/// The constraint check runs before any encryption so doomed requests cost
/// nothing. If `password` is given, only the wrapped key reaches the share
/// URL; the raw key is zeroized when it drops at the end of this function.
pub async fn send_note<R: Relay>(
    relay: &R,
    base: &Url,
    payload: &NotePayload,
    constraints: ShareConstraints,
    password: Option<&SecretString>,
    kdf: &KdfParams,
    opts: &SealOptions,
) -> EphemResult<SendOutcome> {
    let limits = relay.status().await?;
    check_constraints(&constraints, payload.total_size(), &limits)?;

    let key = generate_note_key(&mut OsRng)?;
    let mut envelope = Vec::new();
    let summary = seal(payload, &key, opts, &mut OsRng, &mut envelope)?;
    debug!(
        chunks = summary.body_chunks,
        bytes = summary.envelope_bytes,
        "envelope sealed"
    );

    let material = match password {
        Some(password) => KeyMaterial::Wrapped(wrap_note_key(&key, password, kdf, &mut OsRng)?),
        None => KeyMaterial::Raw(key),
    };

    let note_id = relay.put_note(&envelope, &constraints).await?;
    let url = encode_share_url(base, &note_id, &material)?;
    info!(%note_id, "note stored");

    Ok(SendOutcome {
        url,
        note_id,
        summary,
    })
}
