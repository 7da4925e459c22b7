//! Transport boundary.
//!
//! The [`Transport`] trait decouples the session from the byte-moving
//! implementation. Transports are message-oriented: `recv` yields whole
//! buffers sized to what actually arrived, passed to the framer by move,
//! never byte-by-byte copies. A session owns its transport outright and
//! drives it from a single receive task, so the methods take `&mut self`
//! and implementations need no internal locking for the session's sake.
//!
//! # Implementations
//!
//! - [`LoopbackTransport`](crate::LoopbackTransport): in-process pair over
//!   bounded channels; the deterministic test workhorse
//! - [`UdpTransport`](crate::UdpTransport): connected datagram socket
//! - [`SerialTransport`](crate::SerialTransport): background reader thread
//!   over platform serial glue

use std::future::Future;

use bytes::Bytes;

use crate::error::TransportError;

/// What a transport is plugged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// OS serial port.
    Serial,
    /// Outbound TCP stream.
    TcpClient,
    /// Connected UDP socket.
    Udp,
    /// In-process pair.
    Loopback,
}

/// One delivery from a transport's receive side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A received message buffer.
    Data(Bytes),

    /// The bounded receive buffer overflowed; this many messages were
    /// dropped since the last delivery. Parsing state is unaffected, the
    /// session reports it and continues.
    Lagged(u64),
}

/// Abstract async byte/message transport.
pub trait Transport: Send + 'static {
    /// What this transport is plugged into.
    fn kind(&self) -> TransportKind;

    /// True until `close` or a terminal receive error.
    fn is_open(&self) -> bool;

    /// Send `bytes`, returning how many were written. Writes fewer than
    /// requested only on a terminal error.
    fn send(&mut self, bytes: &[u8]) -> impl Future<Output = Result<usize, TransportError>> + Send;

    /// Receive the next delivery. `None` means the transport is closed and
    /// nothing more will arrive.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Close the transport. Idempotent; pending receivers observe `None`.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
