//! # Balanced Codec
//!
//! Frame encode/decode over a byte stream, implemented as a
//! `tokio_util::codec` pair so it can drive `FramedWrite` on egress and be
//! fed incrementally from the read loop on ingress.
//!
//! The codec frames already-serialized payload bytes; application-value
//! serialization happens at the processor surface. Payload-level encryption
//! is the codec's job: when a frame carries the `ENCRYPTED` flag, the
//! configured [`Encryptor`] seals the payload on encode and opens it on
//! decode.
//!
//! ## Security
//! - Maximum frame size: 16 MiB (prevents memory exhaustion)
//! - Magic bytes prevent accidental misinterpretation
//! - Length validation before allocation
//! - AEAD envelope: `nonce(12) ‖ ciphertext ‖ tag(16)`

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{extensions_len, Flags, Frame, Tlv};
use crate::config::{HEADER_SIZE, MAGIC_NUMBER, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};

/// AEAD nonce size prepended to every encrypted payload.
pub const NONCE_SIZE: usize = 12;

/// AEAD authentication tag size appended to every encrypted payload.
pub const TAG_SIZE: usize = 16;

/// Authenticated encryption of payload bytes.
///
/// Any value supporting `encrypt`/`decrypt` may be substituted; the codec
/// does not assume AES.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}

type Aes192Gcm = AesGcm<aes_gcm::aes::Aes192, <Aes128Gcm as AeadCore>::NonceSize>;

enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Cipher::Aes128(_) => "Aes128",
            Cipher::Aes192(_) => "Aes192",
            Cipher::Aes256(_) => "Aes256",
        };
        f.debug_tuple(variant).finish()
    }
}

/// AES-GCM [`Encryptor`] for 16-, 24- and 32-byte keys.
///
/// Every `encrypt` draws a fresh random nonce and emits
/// `nonce ‖ ciphertext_with_tag`. `decrypt` verifies the tag and returns a
/// uniform `DecryptionFailed` on any failure, leaking nothing about the
/// cause.
#[derive(Debug)]
pub struct AesGcmEncryptor {
    cipher: Cipher,
}

impl AesGcmEncryptor {
    pub fn new(key: &[u8]) -> Result<AesGcmEncryptor> {
        let cipher = match key.len() {
            16 => Cipher::Aes128(
                Aes128Gcm::new_from_slice(key).map_err(|_| ProtocolError::InvalidKey)?,
            ),
            24 => Cipher::Aes192(
                Aes192Gcm::new_from_slice(key).map_err(|_| ProtocolError::InvalidKey)?,
            ),
            32 => Cipher::Aes256(
                Aes256Gcm::new_from_slice(key).map_err(|_| ProtocolError::InvalidKey)?,
            ),
            _ => return Err(ProtocolError::InvalidKey),
        };
        Ok(AesGcmEncryptor { cipher })
    }
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = match &self.cipher {
            Cipher::Aes128(c) => c.encrypt(&nonce, data),
            Cipher::Aes192(c) => c.encrypt(&nonce, data),
            Cipher::Aes256(c) => c.encrypt(&nonce, data),
        }
        .map_err(|_| ProtocolError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_SIZE {
            return Err(ProtocolError::DecryptionFailed);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce);
        match &self.cipher {
            Cipher::Aes128(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes192(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| ProtocolError::DecryptionFailed)
    }
}

/// Frame codec for the balanced wire format.
///
/// Stateless beyond the optional encryptor handle: safe to clone one
/// instance per stream direction. The processor serializes writes, so
/// concurrent encodes never interleave frames on the wire.
#[derive(Clone, Default)]
pub struct BalancedCodec {
    encryptor: Option<Arc<dyn Encryptor>>,
}

impl BalancedCodec {
    pub fn new() -> BalancedCodec {
        BalancedCodec::default()
    }

    pub fn with_encryptor(encryptor: Arc<dyn Encryptor>) -> BalancedCodec {
        BalancedCodec {
            encryptor: Some(encryptor),
        }
    }

    pub fn set_encryptor(&mut self, encryptor: Arc<dyn Encryptor>) {
        self.encryptor = Some(encryptor);
    }
}

impl Encoder<Frame> for BalancedCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.check_extensions()?;

        let mut flags = frame.flags;
        let payload = if flags.contains(Flags::ENCRYPTED) {
            let encryptor = self
                .encryptor
                .as_ref()
                .ok_or(ProtocolError::EncryptionFailed)?;
            Bytes::from(encryptor.encrypt(&frame.payload)?)
        } else {
            frame.payload
        };

        // The EXTENDED bit must mirror the actual region or the decoder
        // loses frame alignment.
        if frame.extensions.is_empty() {
            flags.remove(Flags::EXTENDED);
        } else {
            flags.insert(Flags::EXTENDED);
        }
        let ext_len = extensions_len(&frame.extensions);

        let total = HEADER_SIZE + ext_len + payload.len();
        if total > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(total));
        }

        dst.reserve(total);
        dst.put_u32(MAGIC_NUMBER);
        dst.put_u8((PROTOCOL_VERSION << 4) | flags.bits());
        dst.put_u8((total >> 16) as u8);
        dst.put_u8((total >> 8) as u8);
        dst.put_u8(total as u8);
        dst.put_u64(frame.request_id);
        dst.put_u32(frame.type_id);

        if !frame.extensions.is_empty() {
            for tlv in &frame.extensions {
                dst.put_u8(tlv.tlv_type);
                dst.put_u16(tlv.value.len() as u16);
                dst.put_slice(&tlv.value);
            }
            // Sentinel: type 0, length 0.
            dst.put_bytes(0, 3);
        }

        dst.put_slice(&payload);
        Ok(())
    }
}

impl Decoder for BalancedCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let magic = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if magic != MAGIC_NUMBER {
            return Err(ProtocolError::InvalidMagic);
        }

        let version = src[4] >> 4;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let flags = Flags::from_bits(src[4]);

        let total = ((src[5] as usize) << 16) | ((src[6] as usize) << 8) | src[7] as usize;
        if !(HEADER_SIZE..=MAX_MESSAGE_SIZE).contains(&total) {
            return Err(ProtocolError::InvalidLength(total));
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let bytes = src.split_to(total).freeze();
        let request_id = u64::from_be_bytes([
            bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        ]);
        let type_id = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);

        let mut offset = HEADER_SIZE;
        let mut extensions = Vec::new();
        if flags.contains(Flags::EXTENDED) {
            loop {
                if offset + 3 > total {
                    return Err(ProtocolError::InvalidMessageFormat);
                }
                let tlv_type = bytes[offset];
                let len = u16::from_be_bytes([bytes[offset + 1], bytes[offset + 2]]) as usize;
                offset += 3;
                if len == 0 {
                    break;
                }
                if offset + len > total {
                    return Err(ProtocolError::InvalidMessageFormat);
                }
                extensions.push(Tlv {
                    tlv_type,
                    value: bytes.slice(offset..offset + len),
                });
                offset += len;
            }
        }

        let mut payload = bytes.slice(offset..);
        if flags.contains(Flags::ENCRYPTED) {
            let encryptor = self
                .encryptor
                .as_ref()
                .ok_or(ProtocolError::DecryptionFailed)?;
            payload = Bytes::from(encryptor.decrypt(&payload)?);
        }

        Ok(Some(Frame {
            type_id,
            request_id,
            flags,
            extensions,
            payload,
        }))
    }
}
