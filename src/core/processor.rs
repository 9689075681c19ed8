//! # Processor
//!
//! The per-connection state machine: one long-running read loop decoding
//! frames in wire order, a correlation fast path waking parked `request`
//! callers, and per-frame handler fan-out on fresh tasks.
//!
//! The processor owns its connection exclusively. Outbound frames from any
//! task funnel through one framed writer behind a mutex, so frames are never
//! interleaved on the wire.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::codec::BalancedCodec;
use super::context::{Context, MessageWriter};
use super::frame::{Flags, Frame};
use super::registry::TypeRegistry;
use super::request::RequestManager;
use super::response::Response;
use super::serialization::Serializer;
use crate::config::ProcessorConfig;
use crate::error::{ProtocolError, Result};
use crate::transport::Connection;

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed future returned by handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A registered message handler: `(Context) -> error`, one invocation per
/// inbound uncorrelated frame (and per correlated frame with no parked
/// waiter).
pub type Handler = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync>;

/// A composable handler wrapper. For a registration-time list
/// `[m1, m2, ..., mk]` the effective handler is `m1(m2(...mk(h)...))`:
/// first registered is outermost.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

struct Shared {
    writer: tokio::sync::Mutex<FramedWrite<BoxedWrite, BalancedCodec>>,
    reader: Mutex<Option<BoxedRead>>,
    registry: TypeRegistry,
    requests: RequestManager,
    handlers: RwLock<HashMap<String, Handler>>,
    middlewares: RwLock<Vec<Middleware>>,
    config: ProcessorConfig,
    cancel: CancellationToken,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

/// Message processor coordinating decode, dispatch and reply routing for a
/// single connection.
///
/// Cheap to clone; clones share the same connection and state.
#[derive(Clone)]
pub struct Processor {
    shared: Arc<Shared>,
}

impl Processor {
    /// Take ownership of a connection and build a processor around it.
    pub fn new<C: Connection>(conn: C, config: ProcessorConfig) -> Processor {
        let local_addr = conn.local_addr();
        let peer_addr = conn.peer_addr();

        let codec = match &config.encryptor {
            Some(encryptor) => BalancedCodec::with_encryptor(Arc::clone(encryptor)),
            None => BalancedCodec::new(),
        };

        let (read_half, write_half) = tokio::io::split(conn);
        let writer = FramedWrite::new(Box::new(write_half) as BoxedWrite, codec);

        Processor {
            shared: Arc::new(Shared {
                writer: tokio::sync::Mutex::new(writer),
                reader: Mutex::new(Some(Box::new(read_half) as BoxedRead)),
                registry: TypeRegistry::new(),
                requests: RequestManager::new(),
                handlers: RwLock::new(HashMap::new()),
                middlewares: RwLock::new(Vec::new()),
                config,
                cancel: CancellationToken::new(),
                local_addr,
                peer_addr,
            }),
        }
    }

    /// Append a middleware. Handlers registered earlier are not
    /// retroactively wrapped: composition happens once, at registration.
    pub fn use_middleware(&self, middleware: Middleware) {
        self.shared
            .middlewares
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(middleware);
    }

    /// Register a handler for a message type, composing it with the current
    /// middleware list. Re-registration replaces the previous handler.
    pub fn register_handler<F, Fut>(&self, msg_type: &str, handler: F) -> Result<()>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.shared.registry.register(msg_type)?;

        let mut composed: Handler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        {
            let middlewares = self
                .shared
                .middlewares
                .read()
                .unwrap_or_else(|e| e.into_inner());
            for middleware in middlewares.iter().rev() {
                composed = middleware(composed);
            }
        }

        self.shared
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(msg_type.to_string(), composed);
        Ok(())
    }

    /// Fire-and-forget send with `request_id = 0`.
    pub async fn send<T: serde::Serialize + ?Sized>(
        &self,
        msg_type: &str,
        payload: &T,
    ) -> Result<()> {
        debug!(msg_type, "sending message");
        let raw = self.shared.config.serializer.serialize(payload)?;
        self.shared.send_frame(msg_type, raw.into(), 0).await
    }

    /// Fire-and-forget send of pre-serialized payload bytes.
    pub async fn send_raw(&self, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        self.shared.send_frame(msg_type, payload.into(), 0).await
    }

    /// Send a request and await its correlated reply.
    ///
    /// Returns `RequestTimeout` when the configured deadline expires and
    /// `ConnectionClosed` when the processor shuts down first. A reply
    /// arriving after either outcome is silently discarded.
    pub async fn request<T: serde::Serialize + ?Sized>(
        &self,
        msg_type: &str,
        payload: &T,
    ) -> Result<Response> {
        debug!(msg_type, "sending request");
        let (request_id, rx) = self.shared.requests.start_request();

        let sent = async {
            let raw = self.shared.config.serializer.serialize(payload)?;
            self.shared.send_frame(msg_type, raw.into(), request_id).await
        }
        .await;
        if let Err(e) = sent {
            self.shared.requests.cancel_request(request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.shared.config.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ProtocolError::ConnectionClosed),
            Err(_) => {
                self.shared.requests.cancel_request(request_id);
                Err(ProtocolError::RequestTimeout)
            }
        }
    }

    /// Send a correlated reply. The request id must be non-zero.
    pub async fn reply<T: serde::Serialize + ?Sized>(
        &self,
        request_id: u64,
        msg_type: &str,
        payload: &T,
    ) -> Result<()> {
        debug!(request_id, msg_type, "sending reply");
        if request_id == 0 {
            return Err(ProtocolError::Custom(
                "reply requires a non-zero request id".to_string(),
            ));
        }
        let raw = self.shared.config.serializer.serialize(payload)?;
        self.shared.send_frame(msg_type, raw.into(), request_id).await
    }

    /// Send a correlated reply with pre-serialized payload bytes.
    pub async fn reply_raw(
        &self,
        request_id: u64,
        msg_type: &str,
        payload: Vec<u8>,
    ) -> Result<()> {
        if request_id == 0 {
            return Err(ProtocolError::Custom(
                "reply requires a non-zero request id".to_string(),
            ));
        }
        self.shared.send_frame(msg_type, payload.into(), request_id).await
    }

    /// Run the read loop until the connection fails or [`close`] is called.
    ///
    /// Frames are decoded strictly in wire order. Recoverable errors are
    /// logged and the loop continues; malformed-frame and
    /// connection-terminating errors end the loop. Returns `Ok(())` only on
    /// graceful close.
    ///
    /// [`close`]: Processor::close
    #[instrument(skip(self), fields(peer = ?self.shared.peer_addr))]
    pub async fn listen(&self) -> Result<()> {
        let mut reader = self
            .shared
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| {
                ProtocolError::Custom("processor is already listening or closed".to_string())
            })?;

        let mut codec = match &self.shared.config.encryptor {
            Some(encryptor) => BalancedCodec::with_encryptor(Arc::clone(encryptor)),
            None => BalancedCodec::new(),
        };
        let mut buf = BytesMut::with_capacity(8 * 1024);

        loop {
            if let Err(e) = Shared::drain_frames(&self.shared, &mut codec, &mut buf) {
                error!(error = %e, "fatal decode error, closing read loop");
                return Err(e);
            }

            tokio::select! {
                biased;

                _ = self.shared.cancel.cancelled() => {
                    debug!("read loop cancelled");
                    return Ok(());
                }
                read = reader.read_buf(&mut buf) => match read {
                    Ok(0) => {
                        debug!("peer closed the connection");
                        return Err(ProtocolError::ConnectionClosed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let e = ProtocolError::from(e);
                        if e.is_fatal() {
                            error!(error = %e, "fatal read error");
                            return Err(e);
                        }
                        warn!(error = %e, "transient read error");
                    }
                },
            }
        }
    }

    /// Cancel the read loop, fail pending requests with `ConnectionClosed`,
    /// and shut the connection down.
    pub async fn close(&self) -> Result<()> {
        self.shared.cancel.cancel();
        self.shared.requests.abort_all();

        let mut writer = self.shared.writer.lock().await;
        // The peer may already be gone; closing is best-effort.
        if let Err(e) = writer.close().await {
            debug!(error = %e, "error shutting down connection");
        }
        info!("processor closed");
        Ok(())
    }

    /// Payload serializer configured on this processor.
    pub fn serializer(&self) -> Serializer {
        self.shared.config.serializer
    }

    /// Number of requests currently awaiting replies.
    pub fn pending_requests(&self) -> usize {
        self.shared.requests.pending_count()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer_addr
    }
}

impl Shared {
    /// Encode and write one frame. The writer mutex totally orders frames
    /// from concurrent senders.
    async fn send_frame(&self, msg_type: &str, payload: Bytes, request_id: u64) -> Result<()> {
        let type_id = self.registry.register(msg_type)?;

        let mut flags = Flags::NONE;
        if self.config.encryptor.is_some() {
            flags.insert(Flags::ENCRYPTED);
        }

        let frame = Frame {
            type_id,
            request_id,
            flags,
            extensions: Vec::new(),
            payload,
        };

        let mut writer = self.writer.lock().await;
        writer.send(frame).await
    }

    /// Decode every complete frame currently buffered. Recoverable decode
    /// errors are logged and skipped; fatal ones bubble up to end the loop.
    fn drain_frames(
        shared: &Arc<Shared>,
        codec: &mut BalancedCodec,
        buf: &mut BytesMut,
    ) -> Result<()> {
        loop {
            match tokio_util::codec::Decoder::decode(codec, buf) {
                Ok(Some(frame)) => Shared::handle_frame(shared, frame),
                Ok(None) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(error = %e, "failed to decode message, dropping frame");
                }
            }
        }
    }

    fn handle_frame(shared: &Arc<Shared>, frame: Frame) {
        let limit = shared.config.message_size_limit;
        if limit > 0 && frame.payload.len() > limit {
            warn!(
                size = frame.payload.len(),
                limit, "message too large, dropping frame"
            );
            return;
        }

        let Some(msg_type) = shared.registry.get_name(frame.type_id) else {
            error!(type_id = frame.type_id, "unknown message type id");
            return;
        };

        // Correlation fast path: a reply wakes exactly one parked caller and
        // never reaches a handler.
        if frame.request_id > 0 {
            let response = Response::new(
                msg_type.clone(),
                frame.request_id,
                frame.payload.clone(),
                shared.config.serializer,
            );
            if shared.requests.complete(frame.request_id, response) {
                return;
            }
        }

        let handler = {
            let handlers = shared.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&msg_type).cloned()
        };
        let Some(handler) = handler else {
            error!(%msg_type, "no handler for message type");
            return;
        };

        let ctx = Context::new(
            msg_type.clone(),
            frame.request_id,
            frame.payload,
            shared.config.serializer,
            Arc::new(ProcessorWriter {
                shared: Arc::clone(shared),
            }),
            shared.local_addr,
            shared.peer_addr,
        );

        // Fan-out: each dispatch runs on its own task so a slow handler
        // never stalls the read loop.
        tokio::spawn(async move {
            debug!(
                %msg_type,
                request_id = ctx.request_id(),
                "dispatching message"
            );
            if let Err(e) = handler(ctx).await {
                error!(error = %e, %msg_type, "error processing message");
            }
        });
    }
}

/// Base [`MessageWriter`] forwarding to the owning processor's encode path.
struct ProcessorWriter {
    shared: Arc<Shared>,
}

#[async_trait::async_trait]
impl MessageWriter for ProcessorWriter {
    async fn write_raw(&self, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        self.shared.send_frame(msg_type, payload.into(), 0).await
    }

    async fn reply_raw(&self, request_id: u64, msg_type: &str, payload: Vec<u8>) -> Result<()> {
        self.shared
            .send_frame(msg_type, payload.into(), request_id)
            .await
    }
}
