//! Envelope serialization: streaming seal and strictly-ordered open
//!
//! Sealing never buffers more than one chunk of plaintext; file contents
//! are streamed from disk. Opening drains chunks in index order and hands
//! out no bytes from a chunk that failed tag verification.

use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use ephem_core::{EphemError, EphemResult};
use ephem_crypto::{
    generate_base_nonce, open_chunk, seal_chunk, ChunkKind, NoteKey, FORMAT_VERSION, NONCE_SIZE,
    TAG_SIZE,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::payload::{FileMeta, NotePayload};
use crate::DEFAULT_CHUNK_SIZE;

/// Largest accepted plaintext chunk size (64 MiB)
const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Largest accepted header ciphertext (1 MiB of JSON is already absurd)
const MAX_HEADER_CT_LEN: u32 = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct SealOptions {
    /// Plaintext bytes per body chunk
    pub chunk_size: usize,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What `seal` produced, for logging and upload sizing.
#[derive(Debug, Clone, Copy)]
pub struct SealSummary {
    /// Total envelope size in bytes
    pub envelope_bytes: u64,
    /// Number of encrypted body chunks
    pub body_chunks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PayloadKind {
    Text,
    Files,
}

/// Encrypted envelope header. Everything here — including file names and
/// sizes — is sensitive and goes through the AEAD like any other block.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    kind: PayloadKind,
    files: Vec<FileMeta>,
    body_len: u64,
    chunk_size: u64,
}

/// Number of body chunks for a given body length. Always at least one, so
/// every envelope carries a final-marked chunk even when the body is empty.
fn body_chunk_count(body_len: u64, chunk_size: u64) -> u64 {
    body_len.div_ceil(chunk_size).max(1)
}

/// Sequential reader over a list of files, each capped at its recorded
/// size so a file growing mid-seal cannot shift later chunk boundaries.
struct FileChain {
    pending: VecDeque<(PathBuf, u64)>,
    current: Option<std::io::Take<fs::File>>,
}

impl FileChain {
    fn new(files: impl IntoIterator<Item = (PathBuf, u64)>) -> Self {
        Self {
            pending: files.into_iter().collect(),
            current: None,
        }
    }
}

impl Read for FileChain {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                let n = reader.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }
            match self.pending.pop_front() {
                Some((path, size)) => {
                    self.current = Some(fs::File::open(path)?.take(size));
                }
                None => return Ok(0),
            }
        }
    }
}

/// Read from `r` until `buf` is full or EOF; returns bytes read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Encrypt `payload` under `key` and stream the envelope into `out`.
///
/// The note key must be fresh: nonce uniqueness relies on one envelope per
/// key.
pub fn seal<W: Write>(
    payload: &NotePayload,
    key: &NoteKey,
    opts: &SealOptions,
    rng: &mut (impl RngCore + CryptoRng),
    out: &mut W,
) -> EphemResult<SealSummary> {
    if opts.chunk_size == 0 || opts.chunk_size > MAX_CHUNK_SIZE {
        return Err(EphemError::Constraint(format!(
            "chunk size {} out of range 1..={MAX_CHUNK_SIZE}",
            opts.chunk_size
        )));
    }

    let body_len = payload.total_size();
    let header = match payload {
        NotePayload::Text(_) => Header {
            kind: PayloadKind::Text,
            files: Vec::new(),
            body_len,
            chunk_size: opts.chunk_size as u64,
        },
        NotePayload::Files(files) => Header {
            kind: PayloadKind::Files,
            files: files.iter().map(|f| f.meta.clone()).collect(),
            body_len,
            chunk_size: opts.chunk_size as u64,
        },
    };

    let base_nonce = generate_base_nonce(rng)?;
    let mut written: u64 = 0;

    out.write_all(&[FORMAT_VERSION])?;
    out.write_all(&base_nonce)?;
    written += 1 + NONCE_SIZE as u64;

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| EphemError::Other(anyhow::anyhow!("header serialization: {e}")))?;
    let header_ct = seal_chunk(key, &base_nonce, 0, ChunkKind::Header, &header_json)?;
    out.write_all(&(header_ct.len() as u32).to_be_bytes())?;
    out.write_all(&header_ct)?;
    written += 4 + header_ct.len() as u64;

    let mut body: Box<dyn Read + '_> = match payload {
        NotePayload::Text(text) => Box::new(std::io::Cursor::new(text.as_bytes())),
        NotePayload::Files(files) => Box::new(FileChain::new(
            files.iter().map(|f| (f.path.clone(), f.meta.size)),
        )),
    };

    let chunks = body_chunk_count(body_len, opts.chunk_size as u64);
    let mut buf = vec![0u8; opts.chunk_size];
    for index in 1..=chunks {
        let is_final = index == chunks;
        let expected = if is_final {
            (body_len - (chunks - 1) * opts.chunk_size as u64) as usize
        } else {
            opts.chunk_size
        };
        let n = read_full(&mut body, &mut buf[..expected])?;
        if n != expected {
            return Err(EphemError::Other(anyhow::anyhow!(
                "payload shrank during sealing: chunk {index} got {n} of {expected} bytes"
            )));
        }
        let kind = if is_final {
            ChunkKind::Final
        } else {
            ChunkKind::Interior
        };
        let ct = seal_chunk(key, &base_nonce, index, kind, &buf[..expected])?;
        out.write_all(&(ct.len() as u32).to_be_bytes())?;
        out.write_all(&ct)?;
        written += 4 + ct.len() as u64;
    }

    debug!(body_len, chunks, envelope_bytes = written, "sealed envelope");
    Ok(SealSummary {
        envelope_bytes: written,
        body_chunks: chunks,
    })
}

/// Decrypted payload description, available once the header authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedPayload {
    Text,
    Files(Vec<FileMeta>),
}

/// Strictly-ordered envelope consumer.
///
/// Construction validates the version byte and authenticates the header;
/// the body is then drained chunk by chunk in index order. Restarting
/// requires re-opening the underlying source.
pub struct EnvelopeReader<R: Read> {
    inner: R,
    key: NoteKey,
    base_nonce: [u8; NONCE_SIZE],
    header: Header,
    body_chunks: u64,
    next_index: u64,
}

impl<R: Read> EnvelopeReader<R> {
    pub fn new(mut inner: R, key: &NoteKey) -> EphemResult<Self> {
        let mut version = [0u8; 1];
        read_exact(&mut inner, &mut version)?;
        if version[0] != FORMAT_VERSION {
            return Err(EphemError::UnsupportedFormat(version[0]));
        }

        let mut base_nonce = [0u8; NONCE_SIZE];
        read_exact(&mut inner, &mut base_nonce)?;

        let mut len_buf = [0u8; 4];
        read_exact(&mut inner, &mut len_buf)?;
        let header_len = u32::from_be_bytes(len_buf);
        if header_len < TAG_SIZE as u32 || header_len > MAX_HEADER_CT_LEN {
            return Err(EphemError::CorruptEnvelope(format!(
                "implausible header length {header_len}"
            )));
        }
        let mut header_ct = vec![0u8; header_len as usize];
        read_exact(&mut inner, &mut header_ct)?;

        let header_json = open_chunk(key, &base_nonce, 0, ChunkKind::Header, &header_ct)?;
        let header: Header = serde_json::from_slice(&header_json)
            .map_err(|e| EphemError::CorruptEnvelope(format!("malformed header: {e}")))?;

        if header.chunk_size == 0 || header.chunk_size > MAX_CHUNK_SIZE as u64 {
            return Err(EphemError::CorruptEnvelope(format!(
                "implausible chunk size {}",
                header.chunk_size
            )));
        }
        let meta_total: u64 = header.files.iter().map(|f| f.size).sum();
        match header.kind {
            PayloadKind::Text if !header.files.is_empty() => {
                return Err(EphemError::CorruptEnvelope(
                    "text note carries file metadata".into(),
                ));
            }
            PayloadKind::Files if meta_total != header.body_len => {
                return Err(EphemError::CorruptEnvelope(format!(
                    "file sizes sum to {meta_total} but body length is {}",
                    header.body_len
                )));
            }
            _ => {}
        }

        let body_chunks = body_chunk_count(header.body_len, header.chunk_size);
        Ok(Self {
            inner,
            key: key.clone(),
            base_nonce,
            header,
            body_chunks,
            next_index: 1,
        })
    }

    /// What this envelope contains, per the authenticated header.
    pub fn payload(&self) -> OpenedPayload {
        match self.header.kind {
            PayloadKind::Text => OpenedPayload::Text,
            PayloadKind::Files => OpenedPayload::Files(self.header.files.clone()),
        }
    }

    pub fn body_len(&self) -> u64 {
        self.header.body_len
    }

    pub fn body_chunks(&self) -> u64 {
        self.body_chunks
    }

    /// Read, decrypt and verify the next body chunk in index order.
    fn next_chunk(&mut self) -> EphemResult<Vec<u8>> {
        debug_assert!(self.next_index <= self.body_chunks);
        let index = self.next_index;
        let is_final = index == self.body_chunks;

        let mut len_buf = [0u8; 4];
        read_exact(&mut self.inner, &mut len_buf)?;
        let ct_len = u32::from_be_bytes(len_buf) as u64;
        if ct_len > self.header.chunk_size + TAG_SIZE as u64 {
            return Err(EphemError::CorruptEnvelope(format!(
                "chunk {index} ciphertext length {ct_len} exceeds chunk size"
            )));
        }
        let mut ct = vec![0u8; ct_len as usize];
        read_exact(&mut self.inner, &mut ct)?;

        let kind = if is_final {
            ChunkKind::Final
        } else {
            ChunkKind::Interior
        };
        let plaintext = open_chunk(&self.key, &self.base_nonce, index, kind, &ct)?;

        let expected = if is_final {
            self.header.body_len - (self.body_chunks - 1) * self.header.chunk_size
        } else {
            self.header.chunk_size
        };
        if plaintext.len() as u64 != expected {
            return Err(EphemError::CorruptEnvelope(format!(
                "chunk {index} decrypted to {} bytes, expected {expected}",
                plaintext.len()
            )));
        }

        self.next_index += 1;
        Ok(plaintext)
    }

    /// After the final chunk, a compliant envelope ends exactly there.
    fn expect_eof(&mut self) -> EphemResult<()> {
        let mut probe = [0u8; 1];
        match self.inner.read(&mut probe)? {
            0 => Ok(()),
            _ => Err(EphemError::CorruptEnvelope(
                "trailing data after final chunk".into(),
            )),
        }
    }

    /// Decrypt a text note to a string.
    pub fn read_text(mut self) -> EphemResult<String> {
        if self.header.kind != PayloadKind::Text {
            return Err(EphemError::CorruptEnvelope(
                "envelope does not contain a text note".into(),
            ));
        }
        let mut body = Vec::with_capacity(self.header.body_len as usize);
        while self.next_index <= self.body_chunks {
            body.extend_from_slice(&self.next_chunk()?);
        }
        self.expect_eof()?;
        String::from_utf8(body)
            .map_err(|_| EphemError::CorruptEnvelope("text note is not valid UTF-8".into()))
    }

    /// Decrypt a file-set note, streaming each file's bytes into the sink
    /// the callback supplies for it. Files are delivered in descriptor
    /// order; the callback runs once per file before its bytes arrive.
    pub fn extract_files<W, F>(mut self, mut sink_for: F) -> EphemResult<()>
    where
        W: Write,
        F: FnMut(&FileMeta) -> EphemResult<W>,
    {
        if self.header.kind != PayloadKind::Files {
            return Err(EphemError::CorruptEnvelope(
                "envelope does not contain files".into(),
            ));
        }

        let files = self.header.files.clone();
        let mut chunk: Vec<u8> = Vec::new();
        let mut pos = 0usize;

        for meta in &files {
            let mut sink = sink_for(meta)?;
            let mut remaining = meta.size;
            while remaining > 0 {
                if pos == chunk.len() {
                    chunk = self.next_chunk()?;
                    pos = 0;
                }
                let take = usize::min(chunk.len() - pos, remaining as usize);
                sink.write_all(&chunk[pos..pos + take])?;
                pos += take;
                remaining -= take as u64;
            }
            sink.flush()?;
        }

        // Drain the mandatory empty final chunk of an all-empty file set
        while self.next_index <= self.body_chunks {
            let tail = self.next_chunk()?;
            if !tail.is_empty() {
                return Err(EphemError::CorruptEnvelope(
                    "body bytes beyond declared file sizes".into(),
                ));
            }
        }
        self.expect_eof()
    }
}

/// `read_exact` with truncation mapped to a structural envelope error.
fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> EphemResult<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EphemError::CorruptEnvelope("unexpected end of envelope".into())
        } else {
            EphemError::Io(e)
        }
    })
}
