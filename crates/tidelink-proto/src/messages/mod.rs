//! Typed decode of BST datagrams.
//!
//! The datagram layer hands over `{bst_id, body}`; this module turns that
//! into one variant of the closed [`BstMessage`] set. Dispatch is by ID:
//! N2K traffic (`0x93`/`0x94`/`0x95`/`0xD0`) decodes into typed frames,
//! response-class IDs (`0xA0`/`0xA2`/`0xA3`/`0xA5`) into [`BemResponse`],
//! and anything else passes through as a raw datagram for the caller to
//! surface however it wants.
//!
//! # Invariants
//!
//! - Each supported ID maps to exactly one variant; the dispatch match is
//!   exhaustive over the supported set and total over `u8`.
//! - Decoding never panics on arbitrary input; every failure is a
//!   structured [`ProtocolError`](crate::ProtocolError).

pub mod bem;
pub mod n2k;
pub mod status;

use crate::{datagram::BstDatagram, errors::Result};

pub use bem::{BemCommand, BemResponse, BemResponseHeader};
pub use n2k::{Bst93, Bst94, Bst95, BstD0, Direction, N2kMessageType, TimestampResolution};
pub use status::{CanStatus, IndiStats, SystemStatus, UniStats};

/// One decoded message from the stream.
///
/// Users pattern-match; there is no runtime casting anywhere in the
/// dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BstMessage {
    /// Gateway-to-host N2K frame with timestamp and source (`0x93`).
    Bst93(Bst93),
    /// Host-to-gateway N2K frame (`0x94`), echoed by some gateways.
    Bst94(Bst94),
    /// Compact CAN frame (`0x95`).
    Bst95(Bst95),
    /// Modern long-payload N2K frame (`0xD0`).
    BstD0(BstD0),
    /// Command response (`0xA0`/`0xA2`/`0xA3`/`0xA5`).
    BemResponse(BemResponse),
    /// Anything without a typed decoder, delivered raw.
    Datagram(BstDatagram),
}

impl BstMessage {
    /// Decode a verified datagram into its typed form.
    ///
    /// Unknown IDs are not an error here: they come back as
    /// [`BstMessage::Datagram`] so a session can deliver them raw alongside
    /// an unsupported-ID warning. Command-class IDs (`0xA1`/`0xA4`/`0xA6`/
    /// `0xA8`) are not normally received by a host and also pass through
    /// raw.
    ///
    /// # Errors
    ///
    /// Decode failures of a *supported* ID (short body, data length
    /// overrun) are returned as errors; the datagram is unusable.
    pub fn decode(datagram: BstDatagram) -> Result<Self> {
        match datagram.bst_id {
            Bst93::BST_ID => Ok(Self::Bst93(Bst93::decode(&datagram.body)?)),
            Bst94::BST_ID => Ok(Self::Bst94(Bst94::decode(&datagram.body)?)),
            Bst95::BST_ID => Ok(Self::Bst95(Bst95::decode(&datagram.body)?)),
            BstD0::BST_ID => Ok(Self::BstD0(BstD0::decode(&datagram.body)?)),
            id if bem::is_response_id(id) => {
                Ok(Self::BemResponse(BemResponse::decode(id, datagram.body)?))
            },
            id => {
                if bem::is_command_id(id) {
                    tracing::warn!(bst_id = id, "command-class datagram received from device");
                }
                Ok(Self::Datagram(datagram))
            },
        }
    }

    /// Whether this message belongs to the extended command/response layer.
    #[must_use]
    pub fn is_bem(&self) -> bool {
        matches!(self, Self::BemResponse(_))
    }

    /// Short stable name of the message class, for event tagging and logs.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Bst93(_) => "bst93",
            Self::Bst94(_) => "bst94",
            Self::Bst95(_) => "bst95",
            Self::BstD0(_) => "bstd0",
            Self::BemResponse(_) => "bem-response",
            Self::Datagram(_) => "datagram",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_by_id() {
        let dg = BstDatagram::new(0x42, vec![1, 2, 3]).unwrap();
        let msg = BstMessage::decode(dg.clone()).unwrap();
        assert_eq!(msg, BstMessage::Datagram(dg));
        assert_eq!(msg.message_type(), "datagram");
    }

    #[test]
    fn command_class_passes_through_raw() {
        let dg = BstDatagram::new(0xA1, vec![0x11]).unwrap();
        let msg = BstMessage::decode(dg.clone()).unwrap();
        assert_eq!(msg, BstMessage::Datagram(dg));
    }

    #[test]
    fn supported_id_with_bad_body_is_an_error() {
        let dg = BstDatagram::new(0x93, vec![0x00]).unwrap();
        assert!(BstMessage::decode(dg).is_err());
    }
}
