//! # Error Types
//!
//! Comprehensive error handling for the messaging framework.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O errors to high-level dispatch failures.
//!
//! ## Error Categories
//! - **I/O Errors**: transport read/write failures
//! - **Codec Errors**: invalid frames, oversized messages, version mismatches
//! - **Cryptographic Errors**: encryption/decryption failures, bad keys
//! - **Dispatch Errors**: missing handlers, type conflicts, request timeouts
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Fatal vs. recoverable
//!
//! The processor read loop classifies errors by kind via
//! [`ProtocolError::is_fatal`]: malformed-frame errors and
//! connection-terminating I/O errors end the loop, everything else is logged
//! and the loop keeps reading.

use std::io;
use thiserror::Error;

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid magic number")]
    InvalidMagic,

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid message length: {0}")]
    InvalidLength(usize),

    #[error("invalid message format")]
    InvalidMessageFormat,

    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid encryption key")]
    InvalidKey,

    #[error("type hash conflict: {0}")]
    TypeConflict(String),

    #[error("request timeout")]
    RequestTimeout,

    #[error("no handler for message type: {0}")]
    HandlerNotFound(String),

    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("serialize error: {0}")]
    SerializeError(String),

    #[error("deserialize error: {0}")]
    DeserializeError(String),

    #[error("invalid payload type")]
    InvalidPayloadType,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error must terminate the read loop.
    ///
    /// Malformed frames leave the stream position unknowable, so everything
    /// after them is garbage. Transport errors that indicate the peer is gone
    /// are equally unrecoverable. All other errors are scoped to a single
    /// frame and the loop may continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProtocolError::InvalidMagic
            | ProtocolError::UnsupportedVersion(_)
            | ProtocolError::InvalidLength(_)
            | ProtocolError::InvalidMessageFormat
            | ProtocolError::ConnectionClosed => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_frame_errors_are_fatal() {
        assert!(ProtocolError::InvalidMagic.is_fatal());
        assert!(ProtocolError::UnsupportedVersion(7).is_fatal());
        assert!(ProtocolError::InvalidLength(3).is_fatal());
        assert!(ProtocolError::InvalidMessageFormat.is_fatal());
        assert!(ProtocolError::ConnectionClosed.is_fatal());
    }

    #[test]
    fn frame_scoped_errors_are_recoverable() {
        assert!(!ProtocolError::MessageTooLarge(1 << 30).is_fatal());
        assert!(!ProtocolError::DecryptionFailed.is_fatal());
        assert!(!ProtocolError::HandlerNotFound("tick".into()).is_fatal());
        assert!(!ProtocolError::DeserializeError("bad json".into()).is_fatal());
    }

    #[test]
    fn io_errors_classified_by_kind() {
        let eof = ProtocolError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.is_fatal());

        let timeout = ProtocolError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(!timeout.is_fatal());
    }
}
