//! Error types for the session layer.
//!
//! Two tiers: [`TransportError`] covers the byte-moving boundary and stays
//! close to I/O, [`ClientError`] is the taxonomy everything above speaks.
//! Transport failures are fatal to their session; protocol violations are
//! not — they flow through the session fault channel while parsing
//! continues. I/O error details cross the boundary as strings so the upper
//! tier stays cloneable and comparable in tests.

use std::{fmt, time::Duration};

use thiserror::Error;
use tidelink_proto::{BemResponse, ProtocolError};

/// Errors raised at the transport boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The device or endpoint could not be opened.
    #[error("failed to open transport: {0}")]
    Open(String),

    /// Mid-stream I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is closed, locally or by the peer.
    #[error("transport closed")]
    Closed,

    /// The bounded message buffer overflowed and messages were dropped.
    #[error("message buffer full, dropped {dropped} message(s)")]
    RateLimited {
        /// Messages dropped since the last report.
        dropped: u64,
    },
}

/// Why a pending request was terminated without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The session closed with the request still in flight.
    SessionClosed,
    /// A newer request with the same correlation key displaced this one.
    DuplicateRequest,
    /// The caller canceled explicitly.
    Explicit,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionClosed => write!(f, "session closed"),
            Self::DuplicateRequest => write!(f, "displaced by duplicate request"),
            Self::Explicit => write!(f, "canceled by caller"),
        }
    }
}

/// Errors surfaced by a session to its callers and fault channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Port busy, not found, or permission denied.
    #[error("failed to open transport: {reason}")]
    TransportOpenFailed {
        /// Underlying open failure.
        reason: String,
    },

    /// Mid-stream I/O failure. Fatal for the session.
    #[error("transport I/O failure: {reason}")]
    TransportIo {
        /// Underlying I/O failure.
        reason: String,
    },

    /// Remote or local close. Fatal for the session.
    #[error("transport closed")]
    TransportClosed,

    /// No matching response arrived within the request's timeout.
    #[error("no response within {elapsed:?}")]
    Timeout {
        /// The timeout that elapsed.
        elapsed: Duration,
    },

    /// Recoverable wire violation: malformed frame, bad checksum,
    /// unsupported ID. The session continues.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// API misuse local to one call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Receive buffer overflow; messages were dropped and parsing
    /// continues.
    #[error("receive buffer overflow, dropped {dropped} message(s)")]
    RateLimited {
        /// Messages dropped since the last report.
        dropped: u64,
    },

    /// The request was terminated without a device response.
    #[error("request canceled: {0}")]
    Canceled(CancelReason),

    /// The device answered with a non-zero result code. The decoded
    /// response rides along so callers can inspect the model, serial, and
    /// any payload returned with the error.
    #[error("device reported error {code:#010x}")]
    DeviceError {
        /// Device result code.
        code: u32,
        /// The full decoded response.
        response: BemResponse,
    },
}

impl ClientError {
    /// True for failures that end the session. Everything else is scoped
    /// to one request or one received frame.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportOpenFailed { .. } | Self::TransportIo { .. } | Self::TransportClosed
        )
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Open(reason) => Self::TransportOpenFailed { reason },
            TransportError::Io(io) => Self::TransportIo { reason: io.to_string() },
            TransportError::Closed => Self::TransportClosed,
            TransportError::RateLimited { dropped } => Self::RateLimited { dropped },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        assert!(ClientError::TransportClosed.is_fatal());
        assert!(ClientError::TransportIo { reason: "broken pipe".into() }.is_fatal());
        assert!(!ClientError::Timeout { elapsed: Duration::from_millis(100) }.is_fatal());
        assert!(!ClientError::Canceled(CancelReason::DuplicateRequest).is_fatal());
        assert!(!ClientError::RateLimited { dropped: 3 }.is_fatal());
    }

    #[test]
    fn transport_error_mapping() {
        let err: ClientError = TransportError::Closed.into();
        assert_eq!(err, ClientError::TransportClosed);

        let err: ClientError = TransportError::RateLimited { dropped: 2 }.into();
        assert_eq!(err, ClientError::RateLimited { dropped: 2 });
    }
}
