//! # Frame Model
//!
//! The in-flight message: a 32-bit type id, a 64-bit request id (0 means
//! uncorrelated), a 4-bit flag set, optional TLV extensions, and an opaque
//! payload.
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version<<4|Flags(1)] [TotalLength(3)] [RequestID(8)] [TypeID(4)]
//! [Extension TLVs ... sentinel]    (only when the EXTENDED flag is set)
//! [Payload(N)]
//! ```
//! All multi-byte integers are big-endian. The TLV region is a sequence of
//! `type:u8 | length:u16 | value` records terminated by a 3-byte record with
//! `length == 0`.

use bytes::Bytes;

use crate::error::{ProtocolError, Result};

/// Frame flag set, the low nibble of byte 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// No special handling.
    pub const NONE: Flags = Flags(0x0);
    /// Payload is compressed. Reserved: the codec passes such payloads
    /// through undisturbed.
    pub const COMPRESSED: Flags = Flags(0x1);
    /// Payload is AEAD-encrypted.
    pub const ENCRYPTED: Flags = Flags(0x2);
    /// Frame carries a TLV extension region.
    pub const EXTENDED: Flags = Flags(0x8);

    /// Build from a raw nibble, masking out the version bits.
    pub fn from_bits(bits: u8) -> Flags {
        Flags(bits & 0x0F)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// A single Type-Length-Value extension record.
///
/// The value length must fit in a `u16`; encoding a longer value fails with
/// `InvalidMessageFormat`. A record with an empty value is legal on the wire
/// but indistinguishable from the terminating sentinel, so the codec rejects
/// it at encode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Tlv {
        Tlv {
            tlv_type,
            value: value.into(),
        }
    }

    /// Bytes this record occupies on the wire: 3-byte header plus value.
    pub fn encoded_len(&self) -> usize {
        3 + self.value.len()
    }
}

/// Wire length of an extension region: all records plus the 3-byte sentinel.
/// Zero when there are no extensions (the region is absent entirely).
pub(crate) fn extensions_len(extensions: &[Tlv]) -> usize {
    if extensions.is_empty() {
        0
    } else {
        extensions.iter().map(Tlv::encoded_len).sum::<usize>() + 3
    }
}

/// A single protocol message with its framing metadata.
///
/// The payload holds already-serialized bytes; serialization and
/// deserialization of application values happen at the processor surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub type_id: u32,
    pub request_id: u64,
    pub flags: Flags,
    pub extensions: Vec<Tlv>,
    pub payload: Bytes,
}

impl Frame {
    /// An uncorrelated frame with no flags and no extensions.
    pub fn new(type_id: u32, payload: impl Into<Bytes>) -> Frame {
        Frame {
            type_id,
            request_id: 0,
            flags: Flags::NONE,
            extensions: Vec::new(),
            payload: payload.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: u64) -> Frame {
        self.request_id = request_id;
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Frame {
        self.flags = flags;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<Tlv>) -> Frame {
        self.extensions = extensions;
        self
    }

    /// Total size this frame will occupy on the wire, before any payload
    /// encryption overhead.
    pub fn wire_len(&self) -> usize {
        crate::config::HEADER_SIZE + extensions_len(&self.extensions) + self.payload.len()
    }

    /// Validate extension records for encodability.
    pub(crate) fn check_extensions(&self) -> Result<()> {
        for tlv in &self.extensions {
            if tlv.value.is_empty() || tlv.value.len() > u16::MAX as usize {
                return Err(ProtocolError::InvalidMessageFormat);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_operations() {
        let mut flags = Flags::NONE;
        assert!(!flags.contains(Flags::ENCRYPTED));

        flags.insert(Flags::ENCRYPTED);
        assert!(flags.contains(Flags::ENCRYPTED));
        assert!(!flags.contains(Flags::EXTENDED));

        let both = Flags::ENCRYPTED | Flags::EXTENDED;
        assert_eq!(both.bits(), 0x0A);
        assert!(both.contains(Flags::ENCRYPTED));
    }

    #[test]
    fn from_bits_masks_version_nibble() {
        let flags = Flags::from_bits(0x2F);
        assert_eq!(flags.bits(), 0x0F);
    }

    #[test]
    fn extension_region_length() {
        assert_eq!(extensions_len(&[]), 0);

        let tlvs = vec![
            Tlv::new(1, Bytes::from_static(b"test")),
            Tlv::new(2, Bytes::from_static(b"ext")),
        ];
        // (3 + 4) + (3 + 3) + 3-byte sentinel
        assert_eq!(extensions_len(&tlvs), 16);
    }

    #[test]
    fn wire_len_counts_header_extensions_payload() {
        let frame = Frame::new(42, Bytes::from_static(b"hello"))
            .with_extensions(vec![Tlv::new(1, Bytes::from_static(b"x"))]);
        assert_eq!(frame.wire_len(), 20 + (3 + 1 + 3) + 5);
    }

    #[test]
    fn empty_tlv_value_rejected() {
        let frame =
            Frame::new(1, Bytes::new()).with_extensions(vec![Tlv::new(1, Bytes::new())]);
        assert!(frame.check_extensions().is_err());
    }
}
