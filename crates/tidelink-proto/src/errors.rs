//! Error types for the wire protocol layer.
//!
//! Every decode failure is a structured [`ProtocolError`] variant carrying
//! enough context (expected/actual sizes, offending identifiers) to be
//! reported through a session error channel without re-parsing the input.
//! None of these are fatal to a byte stream: the framer resynchronizes on
//! the next frame start and parsing continues.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing, unframing, or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame buffer exceeded the configured maximum before the end marker.
    #[error("frame exceeds maximum size: {size} > {max}")]
    FrameTooLarge {
        /// Bytes accumulated when the limit was hit
        size: usize,
        /// Configured maximum frame size
        max: usize,
    },

    /// A new frame start arrived before the previous frame ended.
    #[error("frame aborted by new start-of-frame marker")]
    FrameAborted,

    /// A DLE escape introduced a byte that is not a valid control character.
    #[error("invalid escape sequence: DLE followed by {byte:#04x}")]
    InvalidEscape {
        /// The byte that followed the escape character
        byte: u8,
    },

    /// Frame payload too short to hold a BST datagram header.
    #[error("truncated datagram: {len} bytes")]
    TruncatedDatagram {
        /// Actual payload length
        len: usize,
    },

    /// Datagram length field disagrees with the framed payload size.
    #[error("datagram length mismatch for id {bst_id:#04x}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// BST message class identifier
        bst_id: u8,
        /// Length implied by the length field
        expected: usize,
        /// Length of the framed payload
        actual: usize,
    },

    /// Zero-sum checksum over the datagram did not verify.
    #[error("checksum mismatch in datagram id {bst_id:#04x}")]
    ChecksumMismatch {
        /// BST message class identifier
        bst_id: u8,
    },

    /// Datagram ID has no entry in the dispatch table.
    #[error("unsupported BST id {0:#04x}")]
    UnsupportedBstId(u8),

    /// Message body shorter than the fixed fields of its BST variant.
    #[error("short frame for id {bst_id:#04x}: need {expected} bytes, have {actual}")]
    ShortFrame {
        /// BST message class identifier
        bst_id: u8,
        /// Minimum body length for this variant
        expected: usize,
        /// Actual body length
        actual: usize,
    },

    /// Declared data length exceeds the bytes present in the body.
    #[error("declared data length {declared} exceeds available {available} bytes")]
    DataLengthOverrun {
        /// Data length claimed by the message
        declared: usize,
        /// Bytes actually present after the fixed fields
        available: usize,
    },

    /// Payload too long for the message variant being encoded.
    #[error("payload of {len} bytes exceeds maximum {max} for this message")]
    BodyTooLong {
        /// Supplied payload length
        len: usize,
        /// Maximum the variant can carry
        max: usize,
    },

    /// Command data exceeds the BEM command payload limit.
    #[error("command data of {len} bytes exceeds maximum {max}")]
    CommandTooLong {
        /// Supplied data length
        len: usize,
        /// Maximum command data length
        max: usize,
    },

    /// Response body shorter than the fixed response header.
    #[error("response body of {len} bytes is shorter than the {expected}-byte header")]
    ResponseTooShort {
        /// Actual body length
        len: usize,
        /// Fixed header size
        expected: usize,
    },

    /// Parameter group number does not fit in 18 bits.
    #[error("PGN {0:#x} out of range")]
    PgnOutOfRange(u32),

    /// Mandatory section of a status record was cut short.
    #[error("truncated {section} section: need {needed} bytes, have {available}")]
    TruncatedStatus {
        /// Name of the section being parsed
        section: &'static str,
        /// Bytes the section requires
        needed: usize,
        /// Bytes remaining in the record
        available: usize,
    },

    /// A record count field is outside its allowed range.
    #[error("{field} count {value} outside {min}..={max}")]
    CountOutOfRange {
        /// Name of the count field
        field: &'static str,
        /// Value found on the wire
        value: u8,
        /// Lowest allowed value
        min: u8,
        /// Highest allowed value
        max: u8,
    },
}

impl ProtocolError {
    /// True for framing-level violations (the sub-kinds of a malformed
    /// frame), as opposed to message-level decode failures.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. }
                | Self::FrameAborted
                | Self::InvalidEscape { .. }
                | Self::TruncatedDatagram { .. }
                | Self::LengthMismatch { .. }
                | Self::ChecksumMismatch { .. }
        )
    }
}
