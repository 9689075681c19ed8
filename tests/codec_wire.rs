//! Byte-level wire format tests for the balanced codec
//!
//! These pin the exact on-wire layout: header fields, TLV extension region,
//! streaming decode behavior, and the encryption envelope overhead.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use msgmux::config::{HEADER_SIZE, MAX_MESSAGE_SIZE};
use msgmux::{fnv1a_32, AesGcmEncryptor, BalancedCodec, Flags, Frame, ProtocolError, Tlv};
use tokio_util::codec::{Decoder, Encoder};

const KEY_16: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10,
];

fn encode_with(codec: &mut BalancedCodec, frame: Frame) -> BytesMut {
    let mut wire = BytesMut::new();
    codec.encode(frame, &mut wire).expect("encode");
    wire
}

#[test]
fn header_layout_is_exact() {
    let mut codec = BalancedCodec::new();
    let type_id = fnv1a_32(b"echo");
    let wire = encode_with(
        &mut codec,
        Frame::new(type_id, Bytes::from_static(b"hi")).with_request_id(0x0102_0304_0506_0708),
    );

    assert_eq!(wire.len(), 22);
    // Magic "CHPM"
    assert_eq!(&wire[0..4], &[0x43, 0x48, 0x50, 0x4D]);
    // Version 2, no flags
    assert_eq!(wire[4], 0x20);
    // 24-bit total length
    assert_eq!(&wire[5..8], &[0, 0, 22]);
    // Request id, big-endian
    assert_eq!(&wire[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
    // Type id, big-endian
    assert_eq!(&wire[16..20], &type_id.to_be_bytes());
    // Payload
    assert_eq!(&wire[20..], b"hi");
}

#[test]
fn tlv_region_layout_is_exact() {
    let mut codec = BalancedCodec::new();
    let extensions = vec![
        Tlv::new(1, Bytes::from_static(b"test")),
        Tlv::new(2, Bytes::from_static(b"ext")),
    ];
    let mut wire = encode_with(
        &mut codec,
        Frame::new(5, Bytes::from_static(b"payload")).with_extensions(extensions.clone()),
    );

    // EXTENDED flag forced on.
    assert_eq!(wire[4], 0x28);

    let region = &wire[HEADER_SIZE..HEADER_SIZE + 16];
    assert_eq!(
        region,
        &[
            0x01, 0x00, 0x04, b't', b'e', b's', b't', // first TLV
            0x02, 0x00, 0x03, b'e', b'x', b't', // second TLV
            0x00, 0x00, 0x00, // sentinel
        ]
    );
    assert_eq!(&wire[HEADER_SIZE + 16..], b"payload");

    let decoded = codec.decode(&mut wire).unwrap().unwrap();
    assert_eq!(decoded.extensions, extensions);
    assert_eq!(decoded.payload, Bytes::from_static(b"payload"));
}

#[test]
fn streaming_decode_preserves_partial_frames() {
    let mut codec = BalancedCodec::new();
    let frame = Frame::new(11, Bytes::from_static(b"0123456789"));
    let wire = encode_with(&mut codec, frame.clone());

    let mut buf = BytesMut::new();
    for (i, byte) in wire.iter().enumerate() {
        buf.put_u8(*byte);
        let result = codec.decode(&mut buf).expect("no error on partial input");
        if i < wire.len() - 1 {
            assert!(result.is_none());
            assert_eq!(buf.len(), i + 1);
        } else {
            assert_eq!(result.unwrap(), frame);
            assert!(buf.is_empty());
        }
    }
}

#[test]
fn multiple_frames_decode_in_wire_order() {
    let mut codec = BalancedCodec::new();
    let mut buf = BytesMut::new();
    for i in 0..10u8 {
        codec
            .encode(Frame::new(u32::from(i), vec![i; 4]), &mut buf)
            .unwrap();
    }

    let mut seen = 0u32;
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        assert_eq!(frame.type_id, seen);
        assert_eq!(frame.payload, Bytes::from(vec![seen as u8; 4]));
        seen += 1;
    }
    assert_eq!(seen, 10);
}

#[test]
fn compressed_flag_passes_through_untouched() {
    let mut codec = BalancedCodec::new();
    let frame =
        Frame::new(4, Bytes::from_static(b"already-small")).with_flags(Flags::COMPRESSED);
    let mut wire = encode_with(&mut codec, frame.clone());

    assert_eq!(wire[4], 0x21);
    let decoded = codec.decode(&mut wire).unwrap().unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn encrypted_payload_overhead_and_opacity() {
    let encryptor = Arc::new(AesGcmEncryptor::new(&KEY_16).unwrap());
    let mut codec = BalancedCodec::new();
    codec.set_encryptor(encryptor);

    let plaintext = b"\"hello\"";
    let mut wire = encode_with(
        &mut codec,
        Frame::new(3, Bytes::from_static(plaintext)).with_flags(Flags::ENCRYPTED),
    );

    // Header + nonce + tag + ciphertext, and the ciphertext differs from
    // the plaintext.
    assert_eq!(wire.len(), HEADER_SIZE + 12 + 16 + plaintext.len());
    assert_ne!(&wire[HEADER_SIZE..], plaintext.as_slice());

    let decoded = codec.decode(&mut wire).unwrap().unwrap();
    assert_eq!(decoded.payload, Bytes::from_static(plaintext));
    assert!(decoded.flags.contains(Flags::ENCRYPTED));
}

#[test]
fn oversized_encode_is_rejected() {
    let mut codec = BalancedCodec::new();
    let payload = vec![0u8; MAX_MESSAGE_SIZE - HEADER_SIZE + 1];
    let mut wire = BytesMut::new();

    let err = codec.encode(Frame::new(1, payload), &mut wire).unwrap_err();
    assert!(matches!(err, ProtocolError::MessageTooLarge(_)));
}

#[test]
fn undersized_length_field_is_rejected() {
    // Hand-craft a header claiming a 10-byte total frame.
    let mut wire = BytesMut::new();
    wire.put_u32(0x4348_504D);
    wire.put_u8(0x20);
    wire.put_u8(0);
    wire.put_u8(0);
    wire.put_u8(10);
    wire.put_u64(0);
    wire.put_u32(1);

    let mut codec = BalancedCodec::new();
    let err = codec.decode(&mut wire).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidLength(10)));
}

#[test]
fn unknown_version_is_rejected() {
    let mut codec = BalancedCodec::new();
    let mut wire = encode_with(&mut codec, Frame::new(1, Bytes::from_static(b"x")));
    // Bump the version nibble to 3.
    wire[4] = (wire[4] & 0x0F) | 0x30;

    let err = codec.decode(&mut wire).unwrap_err();
    assert!(matches!(err, ProtocolError::UnsupportedVersion(3)));
}

#[test]
fn empty_payload_frames_are_legal() {
    let mut codec = BalancedCodec::new();
    let mut wire = encode_with(&mut codec, Frame::new(7, Bytes::new()));
    assert_eq!(wire.len(), HEADER_SIZE);

    let decoded = codec.decode(&mut wire).unwrap().unwrap();
    assert!(decoded.payload.is_empty());
}
