//! Hybrid asymmetric encryption middleware.
//!
//! RSA alone cannot encrypt payloads longer than the modulus, so each
//! message is sealed with a fresh AES-256-GCM key and only that key is
//! RSA-OAEP-encrypted. On-wire envelope:
//!
//! ```text
//! [key_len: u32 BE] [rsa_oaep(aes_key)] [aes_gcm(nonce ‖ ciphertext ‖ tag)]
//! ```
//!
//! The private key opens inbound envelopes; the peer's public key seals
//! outbound ones.

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::error;

use crate::core::codec::{AesGcmEncryptor, Encryptor};
use crate::core::context::MessageWriter;
use crate::core::processor::{Handler, Middleware};
use crate::error::{ProtocolError, Result};

/// Build a hybrid RSA-OAEP + AES-GCM encryption middleware.
pub fn rsa_encryption(private_key: RsaPrivateKey, public_key: RsaPublicKey) -> Middleware {
    let private_key = Arc::new(private_key);
    let public_key = Arc::new(public_key);

    Arc::new(move |next: Handler| {
        let private_key = Arc::clone(&private_key);
        let public_key = Arc::clone(&public_key);
        Arc::new(move |mut ctx| {
            let next = Arc::clone(&next);
            let private_key = Arc::clone(&private_key);
            let public_key = Arc::clone(&public_key);
            Box::pin(async move {
                let plaintext = match hybrid_decrypt(&private_key, ctx.raw_data()) {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        error!(error = %e, msg_type = ctx.message_type(), "RSA decryption failed");
                        return Err(e);
                    }
                };
                ctx.set_raw_data(plaintext);

                ctx.set_writer(Arc::new(RsaEncryptedWriter {
                    inner: ctx.writer(),
                    public_key,
                }));

                next(ctx).await
            })
        })
    })
}

/// Writer wrapper sealing serialized payload bytes for the peer's public
/// key.
struct RsaEncryptedWriter {
    inner: Arc<dyn MessageWriter>,
    public_key: Arc<RsaPublicKey>,
}

#[async_trait]
impl MessageWriter for RsaEncryptedWriter {
    async fn write_raw(&self, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        let sealed = hybrid_encrypt(&self.public_key, &payload)?;
        self.inner.write_raw(msg_type, sealed).await
    }

    async fn reply_raw(&self, request_id: u64, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        let sealed = hybrid_encrypt(&self.public_key, &payload)?;
        self.inner.reply_raw(request_id, msg_type, sealed).await
    }
}

/// Seal `data` with a fresh AES-256 key, then RSA-OAEP-encrypt that key.
pub fn hybrid_encrypt(public_key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();

    let mut aes_key = [0u8; 32];
    rng.fill_bytes(&mut aes_key);

    let sealed_data = AesGcmEncryptor::new(&aes_key)?.encrypt(data)?;
    let sealed_key = public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &aes_key)
        .map_err(|_| ProtocolError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(4 + sealed_key.len() + sealed_data.len());
    out.extend_from_slice(&(sealed_key.len() as u32).to_be_bytes());
    out.extend_from_slice(&sealed_key);
    out.extend_from_slice(&sealed_data);
    Ok(out)
}

/// Open an envelope produced by [`hybrid_encrypt`].
pub fn hybrid_decrypt(private_key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(ProtocolError::DecryptionFailed);
    }
    let key_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < 4 + key_len {
        return Err(ProtocolError::DecryptionFailed);
    }

    let sealed_key = &data[4..4 + key_len];
    let sealed_data = &data[4 + key_len..];

    let aes_key = private_key
        .decrypt(Oaep::new::<Sha256>(), sealed_key)
        .map_err(|_| ProtocolError::DecryptionFailed)?;

    AesGcmEncryptor::new(&aes_key)?.decrypt(sealed_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        (private_key, public_key)
    }

    #[test]
    fn envelope_roundtrip() {
        let (private_key, public_key) = test_keys();
        let sealed = hybrid_encrypt(&public_key, b"hybrid secrets").unwrap();

        // 2048-bit RSA key: 256-byte sealed key.
        assert_eq!(&sealed[..4], &256u32.to_be_bytes());
        assert_ne!(&sealed[4..], b"hybrid secrets".as_slice());

        let opened = hybrid_decrypt(&private_key, &sealed).unwrap();
        assert_eq!(opened, b"hybrid secrets");
    }

    #[test]
    fn truncated_envelope_rejected() {
        let (private_key, public_key) = test_keys();
        let sealed = hybrid_encrypt(&public_key, b"payload").unwrap();

        for cut in [0, 3, 10, 200] {
            let err = hybrid_decrypt(&private_key, &sealed[..cut]).unwrap_err();
            assert!(matches!(err, ProtocolError::DecryptionFailed));
        }
    }

    #[test]
    fn wrong_key_rejected() {
        let (_, public_key) = test_keys();
        let (other_private, _) = test_keys();

        let sealed = hybrid_encrypt(&public_key, b"payload").unwrap();
        let err = hybrid_decrypt(&other_private, &sealed).unwrap_err();
        assert!(matches!(err, ProtocolError::DecryptionFailed));
    }
}
