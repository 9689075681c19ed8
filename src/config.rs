//! # Configuration
//!
//! Protocol constants and the per-processor configuration record.
//!
//! ## Configuration Sources
//! - TOML files via `ProcessorConfig::from_file()`
//! - TOML strings via `ProcessorConfig::from_toml()`
//! - Direct instantiation with defaults
//!
//! Unknown keys in a TOML source are rejected at parse time
//! (`deny_unknown_fields`), so misspelled options fail loudly instead of
//! silently falling back to defaults.

use crate::core::codec::Encryptor;
use crate::core::serialization::Serializer;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Protocol magic number, ASCII "CHPM", first four bytes of every frame.
pub const MAGIC_NUMBER: u32 = 0x4348_504D;

/// Current protocol version, carried in the high nibble of byte 4.
pub const PROTOCOL_VERSION: u8 = 2;

/// Fixed header size: magic(4) + version/flags(1) + length(3) +
/// request id(8) + type id(4).
pub const HEADER_SIZE: usize = 20;

/// Max allowed total frame size (16 MiB, the ceiling of the 24-bit length
/// field rounded down to a memory-exhaustion-safe bound).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default deadline for `Processor::request` when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-processor configuration.
///
/// Recognized options: payload serializer, inbound message size limit,
/// request timeout, and an optional payload encryptor. The serializer and
/// encryptor are runtime handles and never round-trip through TOML.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Maximum inbound payload size in bytes; 0 disables the check.
    pub message_size_limit: usize,

    /// Deadline for `request` calls, in milliseconds on the wire format.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Payload serializer for all typed send/bind operations.
    #[serde(skip)]
    pub serializer: Serializer,

    /// When set, every outbound frame is encrypted (the `ENCRYPTED` flag is
    /// forced) and inbound `ENCRYPTED` payloads are decrypted transparently.
    #[serde(skip)]
    pub encryptor: Option<Arc<dyn Encryptor>>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            message_size_limit: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            serializer: Serializer::default(),
            encryptor: None,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("message_size_limit", &self.message_size_limit)
            .field("request_timeout", &self.request_timeout)
            .field("serializer", &self.serializer)
            .field("encryptor", &self.encryptor.as_ref().map(|_| "<configured>"))
            .finish()
    }
}

impl ProcessorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of findings. An empty list means the configuration is
    /// valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.message_size_limit > MAX_MESSAGE_SIZE {
            errors.push(format!(
                "message size limit {} exceeds the protocol frame ceiling of {} bytes",
                self.message_size_limit, MAX_MESSAGE_SIZE
            ));
        }

        if self.request_timeout.is_zero() {
            errors.push("request timeout must be greater than 0".to_string());
        } else if self.request_timeout.as_secs() > 300 {
            errors.push("request timeout too long (maximum: 300s)".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ProcessorConfig::default();
        assert_eq!(config.message_size_limit, 0);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn parses_toml_options() {
        let config =
            ProcessorConfig::from_toml("message_size_limit = 4096\nrequest_timeout = 500\n")
                .unwrap();
        assert_eq!(config.message_size_limit, 4096);
        assert_eq!(config.request_timeout, Duration::from_millis(500));
    }

    #[test]
    fn rejects_unknown_options() {
        let err = ProcessorConfig::from_toml("max_inflight = 12\n").unwrap_err();
        assert!(matches!(err, ProtocolError::ConfigError(_)));
    }

    #[test]
    fn validation_flags_zero_timeout() {
        let config = ProcessorConfig::default_with_overrides(|c| {
            c.request_timeout = Duration::ZERO;
        });
        assert!(!config.validate().is_empty());
        assert!(config.validate_strict().is_err());
    }
}
