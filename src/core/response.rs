//! Reply delivered to a parked `request` caller.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::serialization::Serializer;
use crate::error::Result;

/// A correlated reply, immutable after delivery.
#[derive(Debug, Clone)]
pub struct Response {
    msg_type: String,
    request_id: u64,
    raw_data: Bytes,
    serializer: Serializer,
}

impl Response {
    pub(crate) fn new(
        msg_type: String,
        request_id: u64,
        raw_data: Bytes,
        serializer: Serializer,
    ) -> Response {
        Response {
            msg_type,
            request_id,
            raw_data,
            serializer,
        }
    }

    /// Resolved type name of the reply.
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// The request id this reply answers.
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Deserialize the payload into a concrete value.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        self.serializer.deserialize(&self.raw_data)
    }

    /// Raw payload bytes.
    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }
}
