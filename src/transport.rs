//! # Transport Contract
//!
//! The framework is transport-agnostic: any reliable, ordered,
//! bidirectional byte stream can carry frames. This module defines the
//! [`Connection`] contract the processor consumes and implements it for the
//! common tokio streams.
//!
//! Connection establishment, reconnection and TLS negotiation are out of
//! scope; hand the processor an already-connected stream.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

/// A reliable, ordered, bidirectional byte stream.
///
/// The processor takes exclusive ownership of the connection: once the read
/// loop starts, nothing else may read from or write to it. The address
/// accessors are informational only and default to `None` for transports
/// without socket addresses.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Connection for tokio::net::TcpStream {
    fn local_addr(&self) -> Option<SocketAddr> {
        tokio::net::TcpStream::local_addr(self).ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        tokio::net::TcpStream::peer_addr(self).ok()
    }
}

// Unix sockets have path addresses, not socket addresses; the accessors stay
// at their `None` defaults.
#[cfg(unix)]
impl Connection for tokio::net::UnixStream {}

// In-memory pipe, used throughout the test suite.
impl Connection for tokio::io::DuplexStream {}
