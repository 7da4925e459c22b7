//! In-process transport pair.
//!
//! Two [`LoopbackTransport`] halves joined by bounded channels: what one
//! half sends, the other receives. Capacity is counted in messages, and an
//! overflowing send drops the newest message rather than blocking, the same
//! policy the serial reader applies, so buffer-pressure behavior can be
//! exercised deterministically in tests. One half typically plays the
//! gateway in session tests.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    error::TransportError,
    transport::{Transport, TransportEvent, TransportKind},
};

/// Default message-buffer depth, matching the serial transport.
pub const DEFAULT_CAPACITY: usize = 16;

/// One half of an in-process transport pair.
#[derive(Debug)]
pub struct LoopbackTransport {
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
    open: bool,
}

/// Create a connected pair with `capacity` messages of buffer per
/// direction.
#[must_use]
pub fn pair(capacity: usize) -> (LoopbackTransport, LoopbackTransport) {
    let (a_tx, b_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, a_rx) = mpsc::channel(capacity.max(1));
    (
        LoopbackTransport { tx: a_tx, rx: a_rx, open: true },
        LoopbackTransport { tx: b_tx, rx: b_rx, open: true },
    )
}

impl Transport for LoopbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Loopback
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        match self.tx.try_send(Bytes::copy_from_slice(bytes)) {
            Ok(()) => Ok(bytes.len()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Drop-newest: the message never enters the peer's buffer.
                Err(TransportError::RateLimited { dropped: 1 })
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.open = false;
                Err(TransportError::Closed)
            },
        }
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        if !self.open {
            return None;
        }
        match self.rx.recv().await {
            Some(bytes) => Some(TransportEvent::Data(bytes)),
            None => {
                self.open = false;
                None
            },
        }
    }

    async fn close(&mut self) {
        self.open = false;
        self.rx.close();
    }
}
