use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EphemError, EphemResult};

/// Top-level client configuration (loaded from ephem.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemConfig {
    pub relay: RelayConfig,
    pub crypto: CryptoConfig,
    pub send: SendConfig,
}

impl EphemConfig {
    /// Load configuration from a TOML file, or defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> EphemResult<Self> {
        let Some(path) = path else {
            debug!("no config file, using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EphemError::Config(format!("reading {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| EphemError::Config(format!("parsing {}: {e}", path.display())))?;
        debug!(path = %path.display(), relay = %config.relay.url, "config loaded");
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the relay server
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Log level (default: info)
    pub log_level: String,
}

/// Password-wrapping KDF configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Plaintext bytes per encrypted chunk (default: 1 MiB)
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    /// Default view count attached to new notes (None = server default)
    pub views: Option<u32>,
    /// Default expiration in minutes (None = server default)
    pub expire_minutes: Option<u32>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "https://ephem.sh".into(),
            timeout_secs: 30,
            log_level: "info".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            chunk_size: 1024 * 1024,
        }
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            views: None,
            expire_minutes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[relay]
url = "https://notes.example.org"
timeout_secs = 10
log_level = "debug"

[crypto]
argon2_mem_cost_kib = 131072
argon2_time_cost = 4
argon2_parallelism = 8
chunk_size = 524288

[send]
views = 1
expire_minutes = 60
"#;
        let config: EphemConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.relay.url, "https://notes.example.org");
        assert_eq!(config.relay.timeout_secs, 10);
        assert_eq!(config.relay.log_level, "debug");
        assert_eq!(config.crypto.argon2_mem_cost_kib, 131072);
        assert_eq!(config.crypto.chunk_size, 524288);
        assert_eq!(config.send.views, Some(1));
        assert_eq!(config.send.expire_minutes, Some(60));
    }

    #[test]
    fn test_parse_defaults() {
        let config: EphemConfig = toml::from_str("").unwrap();

        assert_eq!(config.relay.url, "https://ephem.sh");
        assert_eq!(config.relay.log_level, "info");
        assert_eq!(config.crypto.argon2_mem_cost_kib, 65536);
        assert_eq!(config.crypto.argon2_time_cost, 3);
        assert_eq!(config.crypto.chunk_size, 1024 * 1024);
        assert_eq!(config.send.views, None);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[relay]
url = "http://localhost:8000"
"#;
        let config: EphemConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.relay.url, "http://localhost:8000");
        // Defaults
        assert_eq!(config.relay.timeout_secs, 30);
        assert_eq!(config.crypto.argon2_parallelism, 4);
    }

    #[test]
    fn test_load_without_path_is_default() {
        let config = EphemConfig::load(None).unwrap();
        assert_eq!(config.relay.url, "https://ephem.sh");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephem.toml");
        std::fs::write(&path, "[relay]\nurl = \"http://localhost:8000\"\n").unwrap();

        let config = EphemConfig::load(Some(&path)).unwrap();
        assert_eq!(config.relay.url, "http://localhost:8000");
    }

    #[test]
    fn test_load_missing_file() {
        let result = EphemConfig::load(Some(std::path::Path::new("/nonexistent/ephem.toml")));
        assert!(matches!(result, Err(EphemError::Config(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ephem.toml");
        std::fs::write(&path, "[relay\nnot toml").unwrap();

        let result = EphemConfig::load(Some(&path));
        assert!(matches!(result, Err(EphemError::Config(_))));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = EphemConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EphemConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.relay.url, parsed.relay.url);
        assert_eq!(config.crypto.chunk_size, parsed.crypto.chunk_size);
        assert_eq!(config.send.views, parsed.send.views);
    }
}
