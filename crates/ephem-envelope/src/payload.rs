//! Logical note payloads before encryption

use std::path::{Path, PathBuf};

use ephem_core::{EphemError, EphemResult};
use serde::{Deserialize, Serialize};

/// Metadata for one file in a file-set note. Encrypted inside the envelope
/// header; never sent to the relay in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub mime: String,
    pub size: u64,
}

/// A file queued for sealing. Contents stay on disk until the envelope is
/// streamed; only metadata is read up front.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub meta: FileMeta,
    pub path: PathBuf,
}

/// What a note carries: either text or an ordered set of files.
#[derive(Debug, Clone)]
pub enum NotePayload {
    Text(String),
    Files(Vec<FileAttachment>),
}

impl NotePayload {
    pub fn text(text: impl Into<String>) -> Self {
        NotePayload::Text(text.into())
    }

    /// Build a file-set payload from paths, reading metadata only.
    ///
    /// Mime types are inferred from the extension, defaulting to
    /// application/octet-stream.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> EphemResult<Self> {
        if paths.is_empty() {
            return Err(EphemError::Constraint("no files given".into()));
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let meta = std::fs::metadata(path)?;
            if !meta.is_file() {
                return Err(EphemError::Constraint(format!(
                    "not a regular file: {}",
                    path.display()
                )));
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    EphemError::Constraint(format!("unusable file name: {}", path.display()))
                })?
                .to_string();
            let mime = mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string();

            files.push(FileAttachment {
                meta: FileMeta {
                    name,
                    mime,
                    size: meta.len(),
                },
                path: path.to_path_buf(),
            });
        }
        Ok(NotePayload::Files(files))
    }

    /// Total plaintext body size in bytes, known before any encryption.
    ///
    /// Drives chunk-count arithmetic and up-front constraint checks.
    pub fn total_size(&self) -> u64 {
        match self {
            NotePayload::Text(t) => t.len() as u64,
            NotePayload::Files(files) => files.iter().map(|f| f.meta.size).sum(),
        }
    }
}
