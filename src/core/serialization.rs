//! # Payload Serialization
//!
//! Abstraction over the payload encodings supported by the processor.
//! JSON is the default; bincode is available for compact binary encoding of
//! serde types; the raw passthrough accepts pre-serialized byte payloads and
//! nothing else.
//!
//! ## Formats
//! - **Json**: human-readable, interoperable (default)
//! - **Bincode**: compact binary for serde types
//! - **Binary**: passthrough for callers that serialize themselves; any
//!   payload that is not a byte sequence is rejected with
//!   `InvalidPayloadType`
//!
//! The passthrough is implemented as a minimal serde backend that only
//! understands byte sequences, so `Vec<u8>`, `&[u8]` and `bytes`-style
//! wrappers work unchanged while structs and strings are rejected.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Supported payload encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serializer {
    /// Human-readable JSON (default)
    #[default]
    Json,
    /// Compact binary encoding for serde types
    Bincode,
    /// Raw byte passthrough; rejects non-byte payloads
    Binary,
}

impl Serializer {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Serializer::Json => "JSON",
            Serializer::Bincode => "Bincode",
            Serializer::Binary => "Binary",
        }
    }

    /// Serialize a payload value to bytes.
    pub fn serialize<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Serializer::Json => serde_json::to_vec(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            Serializer::Bincode => bincode::serialize(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            Serializer::Binary => value
                .serialize(passthrough::ByteSink)
                .map_err(|_| ProtocolError::InvalidPayloadType),
        }
    }

    /// Deserialize payload bytes into a value.
    pub fn deserialize<'de, T: Deserialize<'de>>(self, data: &'de [u8]) -> Result<T> {
        match self {
            Serializer::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            Serializer::Bincode => bincode::deserialize(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            Serializer::Binary => T::deserialize(passthrough::RawBytesDeserializer::new(data))
                .map_err(|_| ProtocolError::InvalidPayloadType),
        }
    }
}

/// Minimal serde backend for the byte passthrough format.
mod passthrough {
    use serde::de::{IntoDeserializer, SeqAccess, Visitor};
    use serde::ser::{Impossible, SerializeSeq};
    use std::fmt;

    /// Error type shared by both passthrough directions. The message is
    /// discarded at the `Serializer` surface; every failure collapses to
    /// `InvalidPayloadType`.
    #[derive(Debug)]
    pub struct PassthroughError(String);

    impl fmt::Display for PassthroughError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for PassthroughError {}

    impl serde::ser::Error for PassthroughError {
        fn custom<T: fmt::Display>(msg: T) -> Self {
            PassthroughError(msg.to_string())
        }
    }

    impl serde::de::Error for PassthroughError {
        fn custom<T: fmt::Display>(msg: T) -> Self {
            PassthroughError(msg.to_string())
        }
    }

    fn not_bytes() -> PassthroughError {
        PassthroughError("payload is not a byte sequence".to_string())
    }

    /// Serializer that accepts byte slices and sequences of `u8`, nothing
    /// else.
    pub struct ByteSink;

    /// Collects a `u8` sequence into the output buffer.
    pub struct ByteSeq {
        out: Vec<u8>,
    }

    impl SerializeSeq for ByteSeq {
        type Ok = Vec<u8>;
        type Error = PassthroughError;

        fn serialize_element<T: ?Sized + serde::Serialize>(
            &mut self,
            value: &T,
        ) -> Result<(), Self::Error> {
            self.out.push(value.serialize(ByteElement)?);
            Ok(())
        }

        fn end(self) -> Result<Self::Ok, Self::Error> {
            Ok(self.out)
        }
    }

    /// Element serializer for `ByteSeq`: only `u8` is a valid element.
    struct ByteElement;

    macro_rules! reject_scalar {
        ($($method:ident: $ty:ty),* $(,)?) => {
            $(fn $method(self, _v: $ty) -> Result<Self::Ok, Self::Error> {
                Err(not_bytes())
            })*
        };
    }

    impl serde::Serializer for ByteElement {
        type Ok = u8;
        type Error = PassthroughError;
        type SerializeSeq = Impossible<u8, PassthroughError>;
        type SerializeTuple = Impossible<u8, PassthroughError>;
        type SerializeTupleStruct = Impossible<u8, PassthroughError>;
        type SerializeTupleVariant = Impossible<u8, PassthroughError>;
        type SerializeMap = Impossible<u8, PassthroughError>;
        type SerializeStruct = Impossible<u8, PassthroughError>;
        type SerializeStructVariant = Impossible<u8, PassthroughError>;

        fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
            Ok(v)
        }

        reject_scalar! {
            serialize_bool: bool, serialize_i8: i8, serialize_i16: i16,
            serialize_i32: i32, serialize_i64: i64, serialize_u16: u16,
            serialize_u32: u32, serialize_u64: u64, serialize_f32: f32,
            serialize_f64: f64, serialize_char: char, serialize_str: &str,
            serialize_bytes: &[u8],
        }

        fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_some<T: ?Sized + serde::Serialize>(
            self,
            _value: &T,
        ) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_newtype_struct<T: ?Sized + serde::Serialize>(
            self,
            _name: &'static str,
            _value: &T,
        ) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_newtype_variant<T: ?Sized + serde::Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStruct, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant, Self::Error> {
            Err(not_bytes())
        }
    }

    impl serde::Serializer for ByteSink {
        type Ok = Vec<u8>;
        type Error = PassthroughError;
        type SerializeSeq = ByteSeq;
        type SerializeTuple = Impossible<Vec<u8>, PassthroughError>;
        type SerializeTupleStruct = Impossible<Vec<u8>, PassthroughError>;
        type SerializeTupleVariant = Impossible<Vec<u8>, PassthroughError>;
        type SerializeMap = Impossible<Vec<u8>, PassthroughError>;
        type SerializeStruct = Impossible<Vec<u8>, PassthroughError>;
        type SerializeStructVariant = Impossible<Vec<u8>, PassthroughError>;

        fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
            Ok(v.to_vec())
        }

        fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
            Ok(ByteSeq {
                out: Vec::with_capacity(len.unwrap_or(0)),
            })
        }

        // Byte wrappers (serde_bytes-style newtypes) pass through.
        fn serialize_newtype_struct<T: ?Sized + serde::Serialize>(
            self,
            _name: &'static str,
            value: &T,
        ) -> Result<Self::Ok, Self::Error> {
            value.serialize(ByteSink)
        }

        reject_scalar! {
            serialize_bool: bool, serialize_i8: i8, serialize_i16: i16,
            serialize_i32: i32, serialize_i64: i64, serialize_u8: u8,
            serialize_u16: u16, serialize_u32: u32, serialize_u64: u64,
            serialize_f32: f32, serialize_f64: f64, serialize_char: char,
            serialize_str: &str,
        }

        fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_some<T: ?Sized + serde::Serialize>(
            self,
            value: &T,
        ) -> Result<Self::Ok, Self::Error> {
            value.serialize(ByteSink)
        }

        fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_newtype_variant<T: ?Sized + serde::Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<Self::Ok, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStruct, Self::Error> {
            Err(not_bytes())
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant, Self::Error> {
            Err(not_bytes())
        }
    }

    /// Deserializer that presents the raw payload as a byte sequence.
    pub struct RawBytesDeserializer<'de> {
        data: &'de [u8],
    }

    impl<'de> RawBytesDeserializer<'de> {
        pub fn new(data: &'de [u8]) -> Self {
            RawBytesDeserializer { data }
        }
    }

    struct ByteSeqAccess<'de> {
        iter: std::slice::Iter<'de, u8>,
    }

    impl<'de> SeqAccess<'de> for ByteSeqAccess<'de> {
        type Error = PassthroughError;

        fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
        where
            T: serde::de::DeserializeSeed<'de>,
        {
            match self.iter.next() {
                Some(b) => seed.deserialize((*b).into_deserializer()).map(Some),
                None => Ok(None),
            }
        }

        fn size_hint(&self) -> Option<usize> {
            Some(self.iter.len())
        }
    }

    impl<'de> serde::Deserializer<'de> for RawBytesDeserializer<'de> {
        type Error = PassthroughError;

        // Non-byte targets (strings, structs, numbers) funnel through
        // `deserialize_any` via the forward list below and are rejected.
        fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            Err(not_bytes())
        }

        fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            visitor.visit_borrowed_bytes(self.data)
        }

        fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            visitor.visit_byte_buf(self.data.to_vec())
        }

        fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            visitor.visit_seq(ByteSeqAccess {
                iter: self.data.iter(),
            })
        }

        serde::forward_to_deserialize_any! {
            bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str
            string option unit unit_struct newtype_struct tuple tuple_struct
            map struct enum identifier ignored_any
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        who: String,
        count: u32,
    }

    #[test]
    fn json_roundtrip() {
        let msg = Greeting {
            who: "world".to_string(),
            count: 3,
        };
        let bytes = Serializer::Json.serialize(&msg).unwrap();
        let back: Greeting = Serializer::Json.deserialize(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn bincode_roundtrip() {
        let msg = Greeting {
            who: "world".to_string(),
            count: 3,
        };
        let bytes = Serializer::Bincode.serialize(&msg).unwrap();
        let back: Greeting = Serializer::Bincode.deserialize(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn binary_passes_bytes_through() {
        let payload: Vec<u8> = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let bytes = Serializer::Binary.serialize(&payload).unwrap();
        assert_eq!(bytes, payload);

        let back: Vec<u8> = Serializer::Binary.deserialize(&bytes).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn binary_rejects_structs() {
        let msg = Greeting {
            who: "nope".to_string(),
            count: 0,
        };
        let err = Serializer::Binary.serialize(&msg).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayloadType));
    }

    #[test]
    fn binary_rejects_strings() {
        let err = Serializer::Binary.serialize("text").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayloadType));

        let err = Serializer::Binary
            .deserialize::<String>(b"raw")
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayloadType));
    }

    #[test]
    fn format_names() {
        assert_eq!(Serializer::Json.name(), "JSON");
        assert_eq!(Serializer::Bincode.name(), "Bincode");
        assert_eq!(Serializer::Binary.name(), "Binary");
    }

    #[test]
    fn default_format_is_json() {
        assert_eq!(Serializer::default(), Serializer::Json);
    }
}
