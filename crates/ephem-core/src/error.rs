use thiserror::Error;

pub type EphemResult<T> = Result<T, EphemError>;

#[derive(Debug, Error)]
pub enum EphemError {
    /// The system CSPRNG could not produce key material. Fatal, never retried.
    #[error("could not obtain entropy from the system RNG")]
    Entropy,

    /// A single generic failure for every tag-verification problem: wrong
    /// key, wrong password, or corrupted ciphertext. The variants are
    /// deliberately indistinguishable to the caller.
    #[error("decryption failed: wrong key, wrong password, or corrupted data")]
    Decryption,

    /// Structural violation of the envelope: malformed header, missing,
    /// out-of-order, or truncated chunks.
    #[error("corrupted envelope: {0}")]
    CorruptEnvelope(String),

    /// Envelope format version newer than this client understands.
    #[error("unsupported envelope format version {0}")]
    UnsupportedFormat(u8),

    /// The share URL or its key fragment could not be parsed.
    #[error("malformed share URL: {0}")]
    MalformedUrl(String),

    /// Requested views/expiration/payload size rejected before encryption.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Relay transport failure. Kept distinct from cryptographic failures
    /// so callers can tell an unreachable server from a bad key.
    #[error("relay transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EphemError {
    /// Whether this error is a cryptographic failure (as opposed to a
    /// transport, I/O, or validation problem). Retrying a cryptographic
    /// failure with the same inputs cannot succeed.
    pub fn is_cryptographic(&self) -> bool {
        matches!(
            self,
            EphemError::Decryption | EphemError::CorruptEnvelope(_) | EphemError::Entropy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_message_does_not_leak_cause() {
        let msg = EphemError::Decryption.to_string();
        assert!(msg.contains("wrong key, wrong password, or corrupted data"));
    }

    #[test]
    fn transport_is_not_cryptographic() {
        assert!(!EphemError::Transport("timeout".into()).is_cryptographic());
        assert!(EphemError::Decryption.is_cryptographic());
        assert!(EphemError::CorruptEnvelope("short".into()).is_cryptographic());
    }
}
