//! # Handler Context
//!
//! The per-message surface handed to registered handlers, plus the
//! object-safe outbound writer seam that middleware may substitute.
//!
//! The writer deals in already-serialized payload bytes so wrapping writers
//! (encryption, tracing, ...) compose on bytes; the typed `reply`/`write`
//! conveniences on [`Context`] serialize with the processor's serializer
//! before crossing the trait boundary.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::serialization::Serializer;
use crate::error::Result;

/// Outbound surface available to handlers and middleware.
///
/// Middleware may wrap the current writer and install the wrapper with
/// [`Context::set_writer`]; outbound bytes then flow through the wrapper
/// before reaching the connection.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Send an uncorrelated message with a pre-serialized payload.
    async fn write_raw(&self, msg_type: &str, payload: Vec<u8>) -> Result<()>;

    /// Send a correlated reply with a pre-serialized payload.
    async fn reply_raw(&self, request_id: u64, msg_type: &str, payload: Vec<u8>) -> Result<()>;
}

/// Handler-facing view of one inbound message.
pub struct Context {
    msg_type: String,
    request_id: u64,
    raw_data: Bytes,
    serializer: Serializer,
    writer: Arc<dyn MessageWriter>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        msg_type: String,
        request_id: u64,
        raw_data: Bytes,
        serializer: Serializer,
        writer: Arc<dyn MessageWriter>,
        local_addr: Option<SocketAddr>,
        peer_addr: Option<SocketAddr>,
    ) -> Context {
        Context {
            msg_type,
            request_id,
            raw_data,
            serializer,
            writer,
            local_addr,
            peer_addr,
        }
    }

    /// Deserialize the payload into a concrete value.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        self.serializer.deserialize(&self.raw_data)
    }

    /// Resolved type name of this message.
    pub fn message_type(&self) -> &str {
        &self.msg_type
    }

    /// Correlation id; 0 for uncorrelated messages.
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Whether the peer expects a correlated reply.
    pub fn is_request(&self) -> bool {
        self.request_id > 0
    }

    pub fn is_response(&self) -> bool {
        !self.is_request()
    }

    /// Local address of the underlying connection, when the transport has
    /// one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Peer address of the underlying connection, when the transport has
    /// one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Raw payload bytes as they currently stand.
    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    /// Replace the payload bytes. Decryption middleware uses this to swap
    /// ciphertext for plaintext before the next handler runs.
    pub fn set_raw_data(&mut self, data: impl Into<Bytes>) {
        self.raw_data = data.into();
    }

    /// The current outbound writer.
    pub fn writer(&self) -> Arc<dyn MessageWriter> {
        Arc::clone(&self.writer)
    }

    /// Substitute the outbound writer for the remainder of this dispatch.
    pub fn set_writer(&mut self, writer: Arc<dyn MessageWriter>) {
        self.writer = writer;
    }

    /// Payload serializer configured on the owning processor.
    pub fn serializer(&self) -> Serializer {
        self.serializer
    }

    /// Send an uncorrelated message through the current writer.
    pub async fn write<T: Serialize + ?Sized>(&self, msg_type: &str, payload: &T) -> Result<()> {
        let raw = self.serializer.serialize(payload)?;
        self.writer.write_raw(msg_type, raw).await
    }

    /// Reply to this message, echoing its request id and type name. Only
    /// meaningful when `is_request()`.
    pub async fn reply<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let raw = self.serializer.serialize(payload)?;
        self.writer
            .reply_raw(self.request_id, &self.msg_type, raw)
            .await
    }

    /// Send an `"error"`-typed message carrying `{"error": msg}`, correlated
    /// when this message is a request.
    pub async fn error(&self, msg: &str) -> Result<()> {
        let mut body = HashMap::new();
        body.insert("error", msg);
        let raw = self.serializer.serialize(&body)?;
        if self.is_request() {
            self.writer.reply_raw(self.request_id, "error", raw).await
        } else {
            self.writer.write_raw("error", raw).await
        }
    }
}
