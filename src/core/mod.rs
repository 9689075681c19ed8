//! # Core Protocol Components
//!
//! Frame model, balanced codec, type registry, request correlation, and the
//! per-connection processor.
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version<<4|Flags(1)] [TotalLength(3)] [RequestID(8)] [TypeID(4)] [Extensions?] [Payload(N)]
//! ```
//!
//! ## Security
//! - Maximum frame size: 16MB (prevents memory exhaustion)
//! - Magic bytes prevent accidental misinterpretation
//! - Length validation before allocation
//! - Optional AES-GCM payload encryption

pub mod codec;
pub mod context;
pub mod frame;
pub mod processor;
pub mod registry;
pub mod request;
pub mod response;
pub mod serialization;
