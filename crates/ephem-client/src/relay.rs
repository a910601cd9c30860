//! Relay transport: opaque bytes in, opaque bytes out
//!
//! The relay API (unchanged from the reference server):
//! - `GET  /api/status/`        → advertised limits
//! - `POST /api/note/`          → store an envelope, returns `{ "id": ... }`
//! - `GET  /api/note/<id>`      → fetch a stored envelope
//!
//! Envelope bytes travel base64-encoded inside JSON. Transport failures map
//! to `EphemError::Transport` so callers can distinguish an unreachable
//! relay from a cryptographic failure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ephem_core::{EphemError, EphemResult, ServerStatus, ShareConstraints};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// The storage collaborator. Implementations never see plaintext, key
/// material, or URL fragments — only envelope bytes and requested limits.
pub trait Relay {
    fn status(&self) -> impl std::future::Future<Output = EphemResult<ServerStatus>> + Send;

    /// Store an envelope with the requested view/expiration limits and
    /// return the server-assigned note id.
    fn put_note(
        &self,
        envelope: &[u8],
        constraints: &ShareConstraints,
    ) -> impl std::future::Future<Output = EphemResult<String>> + Send;

    fn get_note(
        &self,
        note_id: &str,
    ) -> impl std::future::Future<Output = EphemResult<Vec<u8>>> + Send;
}

#[derive(Serialize)]
struct CreateNoteRequest<'a> {
    contents: &'a str,
    views: Option<u32>,
    expiration: Option<u32>,
}

#[derive(Deserialize)]
struct CreateNoteResponse {
    id: String,
}

#[derive(Deserialize)]
struct GetNoteResponse {
    contents: String,
}

/// HTTP relay client.
pub struct HttpRelay {
    base: Url,
    client: reqwest::Client,
}

impl HttpRelay {
    pub fn new(base: Url, timeout: std::time::Duration) -> EphemResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EphemError::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self { base, client })
    }

    fn api(&self, path: &str) -> EphemResult<Url> {
        self.base
            .join(path)
            .map_err(|e| EphemError::Transport(format!("relay URL: {e}")))
    }
}

fn transport_err(context: &str) -> impl Fn(reqwest::Error) -> EphemError + '_ {
    move |e| EphemError::Transport(format!("{context}: {e}"))
}

impl Relay for HttpRelay {
    async fn status(&self) -> EphemResult<ServerStatus> {
        let url = self.api("/api/status/")?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_err("fetching server status"))?
            .error_for_status()
            .map_err(transport_err("server status"))?;
        resp.json::<ServerStatus>()
            .await
            .map_err(transport_err("parsing server status"))
    }

    async fn put_note(
        &self,
        envelope: &[u8],
        constraints: &ShareConstraints,
    ) -> EphemResult<String> {
        let url = self.api("/api/note/")?;
        let body = CreateNoteRequest {
            contents: &STANDARD.encode(envelope),
            views: constraints.views,
            expiration: constraints.expire_minutes,
        };
        debug!(bytes = envelope.len(), "uploading envelope");
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_err("uploading note"))?
            .error_for_status()
            .map_err(transport_err("storing note"))?;
        let created: CreateNoteResponse = resp
            .json()
            .await
            .map_err(transport_err("parsing store response"))?;
        Ok(created.id)
    }

    async fn get_note(&self, note_id: &str) -> EphemResult<Vec<u8>> {
        let url = self.api(&format!("/api/note/{note_id}"))?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_err("downloading note"))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(EphemError::Transport(
                "note not found: expired, view limit reached, or never existed".into(),
            ));
        }
        let resp = resp
            .error_for_status()
            .map_err(transport_err("downloading note"))?;
        let note: GetNoteResponse = resp
            .json()
            .await
            .map_err(transport_err("parsing note response"))?;
        STANDARD
            .decode(&note.contents)
            .map_err(|e| EphemError::Transport(format!("note contents not base64: {e}")))
    }
}
