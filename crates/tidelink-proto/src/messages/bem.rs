//! Extended command/response layer.
//!
//! Commands ride on BST IDs `0xA1`/`0xA4`/`0xA6`/`0xA8` with a one-byte
//! command ID in front of the data; responses come back on the paired IDs
//! `0xA0`/`0xA2`/`0xA3`/`0xA5` with a fixed 12-byte header identifying the
//! responding device and its result code. The header is parsed zero-copy
//! from untrusted bytes: every 12-byte pattern is a valid header, so the
//! cast cannot misbehave, and semantic checks happen in the accessors'
//! callers.
//!
//! This module does **not** interpret `error_code`; mapping a non-zero code
//! to a device error is session policy, made where the decoded response and
//! the pending request meet.

use bytes::Bytes;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    datagram::BstDatagram,
    errors::{ProtocolError, Result},
};

/// Well-known command IDs.
pub mod bem_id {
    /// Read or change the device operating mode.
    pub const GET_SET_OPERATING_MODE: u8 = 0x11;

    /// Unsolicited boot report.
    pub const STARTUP_STATUS: u8 = 0xF0;

    /// Unsolicited device error report.
    pub const ERROR_REPORT: u8 = 0xF1;

    /// Unsolicited periodic system statistics.
    pub const SYSTEM_STATUS: u8 = 0xF2;

    /// First ID of the unsolicited-only range.
    pub const UNSOLICITED_MIN: u8 = 0xF0;

    /// True for IDs that are never a reply to a command.
    #[must_use]
    pub fn is_unsolicited_only(id: u8) -> bool {
        id >= UNSOLICITED_MIN
    }
}

/// BST IDs carrying commands toward the device.
pub const COMMAND_BST_IDS: [u8; 4] = [0xA1, 0xA4, 0xA6, 0xA8];

/// BST IDs carrying responses back from the device.
pub const RESPONSE_BST_IDS: [u8; 4] = [0xA0, 0xA2, 0xA3, 0xA5];

/// Default command channel.
pub const DEFAULT_COMMAND_BST_ID: u8 = 0xA1;

/// Maximum command data length (body minus the command ID byte).
pub const MAX_COMMAND_DATA: usize = 252;

/// True for BST IDs in the command set.
#[must_use]
pub fn is_command_id(bst_id: u8) -> bool {
    COMMAND_BST_IDS.contains(&bst_id)
}

/// True for BST IDs in the response set.
#[must_use]
pub fn is_response_id(bst_id: u8) -> bool {
    RESPONSE_BST_IDS.contains(&bst_id)
}

/// Response BST ID paired with a command BST ID.
///
/// The pairing is fixed: `A1↔A0`, `A4↔A2`, `A6↔A3`, `A8↔A5`. IDs outside
/// the command set fall back to the default pair.
#[must_use]
pub fn response_id_for(command_bst_id: u8) -> u8 {
    match command_bst_id {
        0xA1 => 0xA0,
        0xA4 => 0xA2,
        0xA6 => 0xA3,
        0xA8 => 0xA5,
        _ => 0xA0,
    }
}

/// A command bound for the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BemCommand {
    /// BST channel the command is sent on.
    pub bst_id: u8,
    /// Command identifier.
    pub bem_id: u8,
    /// Command payload, at most [`MAX_COMMAND_DATA`] bytes.
    pub data: Bytes,
}

impl BemCommand {
    /// Command on the default channel.
    pub fn new(bem_id: u8, data: impl Into<Bytes>) -> Self {
        Self { bst_id: DEFAULT_COMMAND_BST_ID, bem_id, data: data.into() }
    }

    /// Query the current operating mode.
    #[must_use]
    pub fn get_operating_mode() -> Self {
        Self::new(bem_id::GET_SET_OPERATING_MODE, Bytes::new())
    }

    /// Change the operating mode.
    #[must_use]
    pub fn set_operating_mode(mode: u16) -> Self {
        Self::new(bem_id::GET_SET_OPERATING_MODE, mode.to_le_bytes().to_vec())
    }

    /// Serialize into a checksummed datagram: `[bem_id] ++ data`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CommandTooLong` if the data exceeds
    ///   [`MAX_COMMAND_DATA`]
    pub fn to_datagram(&self) -> Result<BstDatagram> {
        if self.data.len() > MAX_COMMAND_DATA {
            return Err(ProtocolError::CommandTooLong {
                len: self.data.len(),
                max: MAX_COMMAND_DATA,
            });
        }
        let mut body = Vec::with_capacity(1 + self.data.len());
        body.push(self.bem_id);
        body.extend_from_slice(&self.data);
        BstDatagram::new(self.bst_id, body)
    }
}

/// Fixed 12-byte response header (little-endian wire order).
///
/// Fields are raw byte arrays to keep the packed layout alignment-free;
/// accessors decode. The layout is cast straight off the wire, so all
/// twelve-byte patterns are structurally valid.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct BemResponseHeader {
    bem_id: u8,
    sequence_id: u8,
    model_id: [u8; 2],
    serial_number: [u8; 4],
    error_code: [u8; 4],
}

impl BemResponseHeader {
    /// Serialized header size.
    pub const SIZE: usize = 12;

    /// Build a header (device-side encode, used by tests and loopback
    /// emulation).
    #[must_use]
    pub fn new(bem_id: u8, sequence_id: u8, model_id: u16, serial_number: u32, error_code: u32) -> Self {
        Self {
            bem_id,
            sequence_id,
            model_id: model_id.to_le_bytes(),
            serial_number: serial_number.to_le_bytes(),
            error_code: error_code.to_le_bytes(),
        }
    }

    /// Command ID this response answers.
    #[must_use]
    pub fn bem_id(&self) -> u8 {
        self.bem_id
    }

    /// Device-side echo of the request sequence counter.
    #[must_use]
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Device model identifier.
    #[must_use]
    pub fn model_id(&self) -> u16 {
        u16::from_le_bytes(self.model_id)
    }

    /// Device serial number.
    #[must_use]
    pub fn serial_number(&self) -> u32 {
        u32::from_le_bytes(self.serial_number)
    }

    /// Device result code; zero is success.
    #[must_use]
    pub fn error_code(&self) -> u32 {
        u32::from_le_bytes(self.error_code)
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(IntoBytes::as_bytes(self));
        out
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for BemResponseHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BemResponseHeader")
            .field("bem_id", &format!("{:#04x}", self.bem_id()))
            .field("sequence_id", &self.sequence_id())
            .field("model_id", &format!("{:#06x}", self.model_id()))
            .field("serial_number", &self.serial_number())
            .field("error_code", &self.error_code())
            .finish()
    }
}

impl PartialEq for BemResponseHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BemResponseHeader {}

/// A decoded response from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BemResponse {
    /// BST channel the response arrived on.
    pub bst_id: u8,
    /// Parsed fixed header.
    pub header: BemResponseHeader,
    /// Payload after the header.
    pub data: Bytes,
}

impl BemResponse {
    /// Decode a response from a datagram body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::ResponseTooShort` if the body cannot hold the
    ///   fixed header
    pub fn decode(bst_id: u8, body: Bytes) -> Result<Self> {
        let Ok((header, _rest)) = BemResponseHeader::read_from_prefix(&body) else {
            return Err(ProtocolError::ResponseTooShort {
                len: body.len(),
                expected: BemResponseHeader::SIZE,
            });
        };

        Ok(Self { bst_id, header, data: body.slice(BemResponseHeader::SIZE..) })
    }

    /// Serialize into a checksummed datagram (device-side encode, used by
    /// tests and loopback emulation).
    pub fn to_datagram(&self) -> Result<BstDatagram> {
        let mut body = Vec::with_capacity(BemResponseHeader::SIZE + self.data.len());
        body.extend_from_slice(&self.header.to_bytes());
        body.extend_from_slice(&self.data);
        BstDatagram::new(self.bst_id, body)
    }

    /// Operating mode carried in a `GetSetOperatingMode` reply, when the
    /// payload is present.
    #[must_use]
    pub fn operating_mode(&self) -> Option<u16> {
        (self.header.bem_id() == bem_id::GET_SET_OPERATING_MODE && self.data.len() >= 2)
            .then(|| u16::from_le_bytes([self.data[0], self.data[1]]))
    }
}
