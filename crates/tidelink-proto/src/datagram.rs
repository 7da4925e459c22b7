//! BST datagram container.
//!
//! A datagram is the length-prefixed unit carried inside one framed payload:
//! `{id, length, body, checksum}`. Two layouts exist, selected by the ID:
//!
//! - **Type 1** (all IDs outside `0xD0..=0xDF`): one length byte counting
//!   only the body.
//! - **Type 2** (IDs `0xD0..=0xDF`): a 16-bit little-endian *total* length
//!   that includes the ID and the two length bytes themselves, allowing
//!   bodies beyond 255 bytes.
//!
//! # Invariants
//!
//! - The zero-sum checksum over the full unescaped datagram (ID, length
//!   bytes, body, checksum) is zero modulo 256. [`BstDatagram::decode`]
//!   rejects anything else; [`BstDatagram::encode`] re-establishes it.
//! - `store_length` carries the wire semantics of the length field: body
//!   length for Type 1, total length for Type 2.
//!
//! Structural validation (length consistency) runs before the checksum so
//! that a corrupt length byte is reported as a length mismatch rather than
//! masquerading as a checksum failure on a mis-sliced buffer.

use bytes::Bytes;

use crate::{
    checksum,
    errors::{ProtocolError, Result},
};

/// First message-class ID using the Type 2 (16-bit total length) layout.
pub const TYPE2_ID_MIN: u8 = 0xD0;

/// Last message-class ID using the Type 2 layout.
pub const TYPE2_ID_MAX: u8 = 0xDF;

/// Fixed overhead of a Type 2 datagram: ID, two length bytes, checksum.
const TYPE2_OVERHEAD: usize = 4;

/// Fixed overhead of a Type 1 datagram: ID, length byte, checksum.
const TYPE1_OVERHEAD: usize = 3;

/// One BST datagram, unframed and checksum-verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BstDatagram {
    /// Message class identifier.
    pub bst_id: u8,

    /// Semantic length field as seen on the wire (body length for Type 1,
    /// total length for Type 2).
    pub store_length: u16,

    /// Uninterpreted payload, exclusive of the checksum byte.
    pub body: Bytes,
}

impl BstDatagram {
    /// Whether `id` selects the Type 2 layout.
    #[must_use]
    pub fn is_type2_id(id: u8) -> bool {
        (TYPE2_ID_MIN..=TYPE2_ID_MAX).contains(&id)
    }

    /// Build a datagram for `bst_id` around `body`, computing the length
    /// field for the layout the ID selects.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BodyTooLong` if the body does not fit the layout's
    ///   length field (255 bytes for Type 1, `u16::MAX - 4` total for
    ///   Type 2).
    pub fn new(bst_id: u8, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();

        let store_length = if Self::is_type2_id(bst_id) {
            let total = body.len() + TYPE2_OVERHEAD;
            let max = usize::from(u16::MAX) - TYPE2_OVERHEAD;
            if body.len() > max {
                return Err(ProtocolError::BodyTooLong { len: body.len(), max });
            }
            total as u16
        } else {
            if body.len() > usize::from(u8::MAX) {
                return Err(ProtocolError::BodyTooLong {
                    len: body.len(),
                    max: usize::from(u8::MAX),
                });
            }
            body.len() as u16
        };

        Ok(Self { bst_id, store_length, body })
    }

    /// Decode a datagram out of one framed payload.
    ///
    /// `buf` is the exact unescaped byte sequence between the frame markers.
    ///
    /// # Errors
    ///
    /// - `TruncatedDatagram` if fewer than three bytes arrived
    /// - `LengthMismatch` if the length field disagrees with `buf.len()`
    /// - `ChecksumMismatch` if the zero-sum check fails
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < TYPE1_OVERHEAD {
            return Err(ProtocolError::TruncatedDatagram { len: buf.len() });
        }

        let bst_id = buf[0];

        let (store_length, body_range) = if Self::is_type2_id(bst_id) {
            let total = usize::from(u16::from_le_bytes([buf[1], buf[2]]));
            if total < TYPE2_OVERHEAD || buf.len() != total {
                return Err(ProtocolError::LengthMismatch {
                    bst_id,
                    expected: total,
                    actual: buf.len(),
                });
            }
            (total as u16, 3..total - 1)
        } else {
            let body_len = usize::from(buf[1]);
            let expected = body_len + TYPE1_OVERHEAD;
            if buf.len() != expected {
                return Err(ProtocolError::LengthMismatch {
                    bst_id,
                    expected,
                    actual: buf.len(),
                });
            }
            (body_len as u16, 2..2 + body_len)
        };

        if !checksum::verify(buf) {
            return Err(ProtocolError::ChecksumMismatch { bst_id });
        }

        Ok(Self { bst_id, store_length, body: Bytes::copy_from_slice(&buf[body_range]) })
    }

    /// Serialize to the unframed wire layout: header, body, checksum byte.
    ///
    /// The result is what the framing layer wraps between frame markers.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + TYPE2_OVERHEAD);
        out.push(self.bst_id);
        if Self::is_type2_id(self.bst_id) {
            out.extend_from_slice(&self.store_length.to_le_bytes());
        } else {
            out.push(self.store_length as u8);
        }
        out.extend_from_slice(&self.body);
        out.push(checksum::zero_sum(&out));
        out
    }
}
