//! Per-message symmetric encryption, independent of the codec-level
//! `ENCRYPTED` flag.
//!
//! Inbound, the middleware decrypts the raw payload before the next handler
//! runs; outbound, it substitutes a writer that encrypts serialized payload
//! bytes before they reach the connection. Both peers must install the
//! middleware with the same key.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::error;

use crate::core::codec::{AesGcmEncryptor, Encryptor};
use crate::core::context::MessageWriter;
use crate::core::processor::{Handler, Middleware};
use crate::error::{ProtocolError, Result};

/// Build an AES-GCM encryption middleware.
///
/// Key material of 16, 24 or 32 bytes is used as-is (AES-128/192/256); any
/// other length is normalized to 32 bytes through SHA-256, so arbitrary
/// secrets are accepted.
pub fn encryption(key: &[u8]) -> Middleware {
    let key = normalize_key(key);
    // normalize_key only ever yields valid AES key lengths.
    let encryptor: Arc<dyn Encryptor> =
        Arc::new(AesGcmEncryptor::new(&key).expect("normalized key length"));

    Arc::new(move |next: Handler| {
        let encryptor = Arc::clone(&encryptor);
        Arc::new(move |mut ctx| {
            let next = Arc::clone(&next);
            let encryptor = Arc::clone(&encryptor);
            Box::pin(async move {
                let plaintext = match encryptor.decrypt(ctx.raw_data()) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        error!(error = %e, msg_type = ctx.message_type(), "decryption failed");
                        return Err(e);
                    }
                };
                ctx.set_raw_data(plaintext);

                ctx.set_writer(Arc::new(EncryptedWriter {
                    inner: ctx.writer(),
                    encryptor,
                }));

                next(ctx).await
            })
        })
    })
}

/// Writer wrapper encrypting serialized payload bytes on the way out.
struct EncryptedWriter {
    inner: Arc<dyn MessageWriter>,
    encryptor: Arc<dyn Encryptor>,
}

#[async_trait]
impl MessageWriter for EncryptedWriter {
    async fn write_raw(&self, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        let sealed = self.encryptor.encrypt(&payload)?;
        self.inner.write_raw(msg_type, sealed).await
    }

    async fn reply_raw(&self, request_id: u64, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        let sealed = self.encryptor.encrypt(&payload)?;
        self.inner.reply_raw(request_id, msg_type, sealed).await
    }
}

fn normalize_key(key: &[u8]) -> Vec<u8> {
    match key.len() {
        16 | 24 | 32 => key.to_vec(),
        _ => Sha256::digest(key).to_vec(),
    }
}

/// Derive a 32-byte key from an arbitrary passphrase.
pub fn key_from_string(passphrase: &str) -> Vec<u8> {
    Sha256::digest(passphrase.as_bytes()).to_vec()
}

/// Decode key material from standard base64.
pub fn key_from_base64(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|_| ProtocolError::InvalidKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_key_lengths_pass_through() {
        assert_eq!(normalize_key(&[7u8; 16]), vec![7u8; 16]);
        assert_eq!(normalize_key(&[7u8; 24]), vec![7u8; 24]);
        assert_eq!(normalize_key(&[7u8; 32]), vec![7u8; 32]);
    }

    #[test]
    fn odd_key_lengths_are_hashed() {
        let key = normalize_key(b"passphrase");
        assert_eq!(key.len(), 32);
        assert_eq!(key, key_from_string("passphrase"));
    }

    #[test]
    fn base64_keys_decode() {
        let key = key_from_base64("AAECAwQFBgcICQoLDA0ODw==").unwrap();
        assert_eq!(key, (0u8..16).collect::<Vec<u8>>());

        assert!(matches!(
            key_from_base64("not base64!"),
            Err(ProtocolError::InvalidKey)
        ));
    }
}
