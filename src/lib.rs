//! # msgmux
//!
//! Message-oriented RPC framework that multiplexes typed application
//! messages over a single bidirectional byte stream.
//!
//! Three interaction patterns share one connection:
//! - **Send**: fire-and-forget messages (`request_id = 0`)
//! - **Request/Response**: correlated replies routed back to the waiting
//!   caller
//! - **Push**: unsolicited server messages dispatched to registered handlers
//!
//! The framework is transport-agnostic (anything implementing
//! [`transport::Connection`]) and serializer-agnostic (JSON by default,
//! bincode and raw binary passthrough available).
//!
//! ## Example
//! ```no_run
//! use msgmux::{Processor, ProcessorConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Echo {
//!     text: String,
//! }
//!
//! # async fn run() -> msgmux::Result<()> {
//! let conn = tokio::net::TcpStream::connect("127.0.0.1:9000").await?;
//! let processor = Processor::new(conn, ProcessorConfig::default());
//!
//! processor.register_handler("echo", |ctx| async move {
//!     let msg: Echo = ctx.bind()?;
//!     ctx.reply(&msg).await
//! })?;
//!
//! let listener = processor.clone();
//! tokio::spawn(async move { listener.listen().await });
//!
//! let response = processor
//!     .request("echo", &Echo { text: "hello".into() })
//!     .await?;
//! let echoed: Echo = response.bind()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire format
//!
//! Frames use the balanced binary protocol: a fixed 20-byte header (magic
//! `"CHPM"`, version, flags, 24-bit length, 64-bit request id, 32-bit
//! FNV-1a type id), an optional TLV extension region, and the payload.
//! Payloads may be AES-GCM encrypted at the codec level; middleware offers
//! per-message symmetric and hybrid-asymmetric encryption above it.

pub mod config;
pub mod core;
pub mod error;
pub mod middleware;
pub mod transport;
pub mod utils;

pub use self::config::ProcessorConfig;
pub use self::core::codec::{AesGcmEncryptor, BalancedCodec, Encryptor};
pub use self::core::context::{Context, MessageWriter};
pub use self::core::frame::{Flags, Frame, Tlv};
pub use self::core::processor::{Handler, HandlerFuture, Middleware, Processor};
pub use self::core::registry::{fnv1a_32, TypeRegistry};
pub use self::core::request::{RequestIdGenerator, RequestManager};
pub use self::core::response::Response;
pub use self::core::serialization::Serializer;
pub use self::error::{ProtocolError, Result};
pub use self::transport::Connection;
