//! Connected-UDP transport.
//!
//! Some gateways expose their serial stream over UDP on the local network.
//! One datagram is one message buffer; framing above it is identical to the
//! serial path.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::{
    error::TransportError,
    transport::{Transport, TransportEvent, TransportKind},
};

/// Default receive buffer size; comfortably holds a maximum Type 2 frame
/// with every byte escaped.
pub const DEFAULT_RECV_BUFFER: usize = 4096;

/// Datagram transport connected to one gateway endpoint.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    recv_buffer: usize,
    open: bool,
}

impl UdpTransport {
    /// Bind `local` and connect to the gateway at `remote`.
    pub async fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TransportError::Open(format!("bind {local}: {e}")))?;
        socket
            .connect(remote)
            .await
            .map_err(|e| TransportError::Open(format!("connect {remote}: {e}")))?;
        Ok(Self { socket, recv_buffer: DEFAULT_RECV_BUFFER, open: true })
    }

    /// Override the receive buffer size.
    #[must_use]
    pub fn with_recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer = bytes.max(1);
        self
    }
}

impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let written = self.socket.send(bytes).await?;
        Ok(written)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        if !self.open {
            return None;
        }
        let mut buf = vec![0u8; self.recv_buffer];
        match self.socket.recv(&mut buf).await {
            Ok(n) => {
                buf.truncate(n);
                Some(TransportEvent::Data(Bytes::from(buf)))
            },
            Err(e) => {
                tracing::error!(error = %e, "datagram receive failed");
                self.open = false;
                None
            },
        }
    }

    async fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn datagram_round_trip() {
        let peer = UdpSocket::bind(localhost()).await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let mut transport = UdpTransport::connect(localhost(), peer_addr).await.unwrap();
        let our_addr = transport.socket.local_addr().unwrap();
        peer.connect(our_addr).await.unwrap();

        transport.send(&[0x10, 0x02, 0xAA]).await.unwrap();
        let mut buf = [0u8; 16];
        let n = peer.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x10, 0x02, 0xAA]);

        peer.send(&[0x55, 0x66]).await.unwrap();
        assert_eq!(
            transport.recv().await,
            Some(TransportEvent::Data(Bytes::from_static(&[0x55, 0x66])))
        );
    }

    #[tokio::test]
    async fn closed_transport_refuses_io() {
        let peer = UdpSocket::bind(localhost()).await.unwrap();
        let mut transport =
            UdpTransport::connect(localhost(), peer.local_addr().unwrap()).await.unwrap();

        transport.close().await;
        assert!(!transport.is_open());
        assert!(matches!(transport.send(&[1]).await, Err(TransportError::Closed)));
        assert_eq!(transport.recv().await, None);
    }
}
