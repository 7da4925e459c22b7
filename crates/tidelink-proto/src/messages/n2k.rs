//! Typed N2K / CAN frame variants.
//!
//! Four wire layouts share this module: the legacy gateway-to-host frame
//! (`0x93`), its host-to-gateway mirror (`0x94`), the compact CAN capture
//! frame (`0x95`), and the modern long-payload frame (`0xD0`). All
//! multi-byte integers are little-endian. Reserved bits in packed control
//! bytes are masked off during decode; decode fails only when the body is
//! shorter than the fixed fields or a declared data length overruns it.

use bytes::Bytes;

use crate::{
    datagram::BstDatagram,
    errors::{ProtocolError, Result},
    pgn,
};

/// Resolution of the 16-bit timestamp in a compact CAN frame.
///
/// Selected by bits 6:5 of the DPPC byte. The raw counter value is
/// surfaced as-is; converting to a duration is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampResolution {
    /// 1 millisecond per tick.
    Millisecond,
    /// 100 microseconds per tick.
    HundredMicroseconds,
    /// 10 microseconds per tick.
    TenMicroseconds,
    /// 1 microsecond per tick.
    Microsecond,
}

impl TimestampResolution {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Millisecond,
            1 => Self::HundredMicroseconds,
            2 => Self::TenMicroseconds,
            _ => Self::Microsecond,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Millisecond => 0,
            Self::HundredMicroseconds => 1,
            Self::TenMicroseconds => 2,
            Self::Microsecond => 3,
        }
    }
}

/// Direction of a captured frame relative to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Frame arrived from the bus.
    Received,
    /// Frame was transmitted by the gateway.
    Transmitted,
}

/// Transport class of a modern N2K frame.
///
/// Fast-packet and multi-packet frames pass through as-is; reassembly, if
/// any, happens upstream of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum N2kMessageType {
    /// Self-contained single-frame message.
    SinglePacket,
    /// Fragment of a fast-packet transfer.
    FastPacket,
    /// Fragment of a multi-packet (transport protocol) transfer.
    MultiPacket,
    /// Reserved encoding.
    Unknown,
}

impl N2kMessageType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::SinglePacket,
            1 => Self::FastPacket,
            2 => Self::MultiPacket,
            _ => Self::Unknown,
        }
    }
}

/// Gateway-to-host N2K frame (BST `0x93`).
///
/// Carries a device-relative millisecond timestamp and the bus source
/// address alongside the PDU fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bst93 {
    /// Bus priority, 3 bits.
    pub priority: u8,
    /// PDU specific byte.
    pub pdu_s: u8,
    /// PDU format byte.
    pub pdu_f: u8,
    /// Data page, 2 bits.
    pub data_page: u8,
    /// Destination address.
    pub destination: u8,
    /// Source address.
    pub source: u8,
    /// Milliseconds since a device-relative epoch.
    pub timestamp_ms: u32,
    /// Frame payload.
    pub data: Bytes,
}

impl Bst93 {
    /// Message class identifier.
    pub const BST_ID: u8 = 0x93;

    /// Fixed fields before the data: priority, PDU bytes, page, addresses,
    /// timestamp, data length.
    const FIXED_LEN: usize = 11;

    /// Decode from a datagram body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::FIXED_LEN {
            return Err(ProtocolError::ShortFrame {
                bst_id: Self::BST_ID,
                expected: Self::FIXED_LEN,
                actual: body.len(),
            });
        }

        let data_len = usize::from(body[10]);
        let available = body.len() - Self::FIXED_LEN;
        if data_len > available {
            return Err(ProtocolError::DataLengthOverrun { declared: data_len, available });
        }

        Ok(Self {
            priority: body[0] & 0x07,
            pdu_s: body[1],
            pdu_f: body[2],
            data_page: body[3] & 0x03,
            destination: body[4],
            source: body[5],
            timestamp_ms: u32::from_le_bytes([body[6], body[7], body[8], body[9]]),
            data: Bytes::copy_from_slice(&body[Self::FIXED_LEN..Self::FIXED_LEN + data_len]),
        })
    }

    /// Serialize into a checksummed datagram.
    pub fn to_datagram(&self) -> Result<BstDatagram> {
        if self.data.len() > usize::from(u8::MAX) {
            return Err(ProtocolError::BodyTooLong {
                len: self.data.len(),
                max: usize::from(u8::MAX),
            });
        }
        let mut body = Vec::with_capacity(Self::FIXED_LEN + self.data.len());
        body.push(self.priority & 0x07);
        body.push(self.pdu_s);
        body.push(self.pdu_f);
        body.push(self.data_page & 0x03);
        body.push(self.destination);
        body.push(self.source);
        body.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        body.push(self.data.len() as u8);
        body.extend_from_slice(&self.data);
        BstDatagram::new(Self::BST_ID, body)
    }

    /// Parameter group number of this frame.
    #[must_use]
    pub fn pgn(&self) -> u32 {
        pgn::compute(self.data_page, self.pdu_f, self.pdu_s)
    }
}

/// Host-to-gateway N2K frame (BST `0x94`).
///
/// No timestamp and no source address: the gateway stamps and sources the
/// frame when it puts it on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bst94 {
    /// Bus priority, 3 bits.
    pub priority: u8,
    /// PDU specific byte.
    pub pdu_s: u8,
    /// PDU format byte.
    pub pdu_f: u8,
    /// Data page, 2 bits.
    pub data_page: u8,
    /// Destination address. Written to its slot even for PDU2, where the
    /// gateway uses it for downstream routing only.
    pub destination: u8,
    /// Frame payload.
    pub data: Bytes,
}

impl Bst94 {
    /// Message class identifier.
    pub const BST_ID: u8 = 0x94;

    const FIXED_LEN: usize = 6;

    /// Build a frame from a PGN, applying the addressing-mode rule: a PDU1
    /// PGN routes `destination` into the PDU specific byte, a PDU2 PGN puts
    /// its own low byte there.
    pub fn from_pgn(priority: u8, pgn_value: u32, destination: u8, data: impl Into<Bytes>) -> Result<Self> {
        let fields = pgn::split(pgn_value, destination)?;
        Ok(Self {
            priority: priority & 0x07,
            pdu_s: fields.pdu_s,
            pdu_f: fields.pdu_f,
            data_page: fields.data_page,
            destination,
            data: data.into(),
        })
    }

    /// Decode from a datagram body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::FIXED_LEN {
            return Err(ProtocolError::ShortFrame {
                bst_id: Self::BST_ID,
                expected: Self::FIXED_LEN,
                actual: body.len(),
            });
        }

        let data_len = usize::from(body[5]);
        let available = body.len() - Self::FIXED_LEN;
        if data_len > available {
            return Err(ProtocolError::DataLengthOverrun { declared: data_len, available });
        }

        Ok(Self {
            priority: body[0] & 0x07,
            pdu_s: body[1],
            pdu_f: body[2],
            data_page: body[3] & 0x03,
            destination: body[4],
            data: Bytes::copy_from_slice(&body[Self::FIXED_LEN..Self::FIXED_LEN + data_len]),
        })
    }

    /// Serialize into a checksummed datagram.
    pub fn to_datagram(&self) -> Result<BstDatagram> {
        if self.data.len() > usize::from(u8::MAX) {
            return Err(ProtocolError::BodyTooLong {
                len: self.data.len(),
                max: usize::from(u8::MAX),
            });
        }
        let mut body = Vec::with_capacity(Self::FIXED_LEN + self.data.len());
        body.push(self.priority & 0x07);
        body.push(self.pdu_s);
        body.push(self.pdu_f);
        body.push(self.data_page & 0x03);
        body.push(self.destination);
        body.push(self.data.len() as u8);
        body.extend_from_slice(&self.data);
        BstDatagram::new(Self::BST_ID, body)
    }

    /// Parameter group number of this frame.
    #[must_use]
    pub fn pgn(&self) -> u32 {
        pgn::compute(self.data_page, self.pdu_f, self.pdu_s)
    }
}

/// Compact CAN frame (BST `0x95`).
///
/// The DPPC byte packs data page, priority, timestamp resolution, and
/// direction; accessors unpack it. The 16-bit timestamp stays raw, paired
/// with [`Bst95::ts_resolution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bst95 {
    /// Raw 16-bit timestamp counter.
    pub timestamp: u16,
    /// Source address.
    pub source: u8,
    /// PDU specific byte.
    pub pdu_s: u8,
    /// PDU format byte.
    pub pdu_f: u8,
    /// Packed control byte: `data_page[1:0] priority[4:2]
    /// ts_resolution[6:5] direction[7]`.
    pub dppc: u8,
    /// CAN payload, at most eight bytes.
    pub data: Bytes,
}

impl Bst95 {
    /// Message class identifier.
    pub const BST_ID: u8 = 0x95;

    /// Maximum CAN payload.
    pub const MAX_DATA: usize = 8;

    const FIXED_LEN: usize = 6;

    /// Pack the DPPC control byte from its fields.
    #[must_use]
    pub fn pack_dppc(
        data_page: u8,
        priority: u8,
        resolution: TimestampResolution,
        direction: Direction,
    ) -> u8 {
        (data_page & 0x03)
            | ((priority & 0x07) << 2)
            | (resolution.bits() << 5)
            | (match direction {
                Direction::Received => 0,
                Direction::Transmitted => 1,
            } << 7)
    }

    /// Decode from a datagram body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::FIXED_LEN {
            return Err(ProtocolError::ShortFrame {
                bst_id: Self::BST_ID,
                expected: Self::FIXED_LEN,
                actual: body.len(),
            });
        }

        let data = &body[Self::FIXED_LEN..];
        if data.len() > Self::MAX_DATA {
            return Err(ProtocolError::BodyTooLong { len: data.len(), max: Self::MAX_DATA });
        }

        Ok(Self {
            timestamp: u16::from_le_bytes([body[0], body[1]]),
            source: body[2],
            pdu_s: body[3],
            pdu_f: body[4],
            dppc: body[5],
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Serialize into a checksummed datagram.
    pub fn to_datagram(&self) -> Result<BstDatagram> {
        if self.data.len() > Self::MAX_DATA {
            return Err(ProtocolError::BodyTooLong { len: self.data.len(), max: Self::MAX_DATA });
        }
        let mut body = Vec::with_capacity(Self::FIXED_LEN + self.data.len());
        body.extend_from_slice(&self.timestamp.to_le_bytes());
        body.push(self.source);
        body.push(self.pdu_s);
        body.push(self.pdu_f);
        body.push(self.dppc);
        body.extend_from_slice(&self.data);
        BstDatagram::new(Self::BST_ID, body)
    }

    /// Data page, 2 bits of the DPPC byte.
    #[must_use]
    pub fn data_page(&self) -> u8 {
        self.dppc & 0x03
    }

    /// Bus priority, 3 bits of the DPPC byte.
    #[must_use]
    pub fn priority(&self) -> u8 {
        (self.dppc >> 2) & 0x07
    }

    /// Tick size of the raw timestamp.
    #[must_use]
    pub fn ts_resolution(&self) -> TimestampResolution {
        TimestampResolution::from_bits(self.dppc >> 5)
    }

    /// Capture direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.dppc & 0x80 == 0 { Direction::Received } else { Direction::Transmitted }
    }

    /// Parameter group number of this frame.
    #[must_use]
    pub fn pgn(&self) -> u32 {
        pgn::compute(self.data_page(), self.pdu_f, self.pdu_s)
    }

    /// Destination address for PDU1 frames, where the PDU specific byte is
    /// the address. `None` for broadcast (PDU2) frames.
    #[must_use]
    pub fn destination(&self) -> Option<u8> {
        pgn::is_pdu1(self.pdu_f).then_some(self.pdu_s)
    }
}

/// Modern long-payload N2K frame (BST `0xD0`, Type 2 datagram).
///
/// Carries up to 1785 data bytes plus transport-class and direction flags
/// in two packed control bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BstD0 {
    /// Destination address.
    pub destination: u8,
    /// Source address.
    pub source: u8,
    /// PDU specific byte.
    pub pdu_s: u8,
    /// PDU format byte.
    pub pdu_f: u8,
    /// Packed byte: `data_page[1:0] priority[4:2] spare[7:5]`.
    pub dpp: u8,
    /// Packed byte: `msg_type[1:0] spare[2] direction[3]
    /// internal_source[4] fp_seq_id[7:5]`.
    pub control: u8,
    /// Milliseconds since a device-relative epoch.
    pub timestamp_ms: u32,
    /// Frame payload.
    pub data: Bytes,
}

impl BstD0 {
    /// Message class identifier.
    pub const BST_ID: u8 = 0xD0;

    /// Maximum payload: a full fast-packet transfer.
    pub const MAX_DATA: usize = 1785;

    const FIXED_LEN: usize = 10;

    /// Decode from a datagram body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < Self::FIXED_LEN {
            return Err(ProtocolError::ShortFrame {
                bst_id: Self::BST_ID,
                expected: Self::FIXED_LEN,
                actual: body.len(),
            });
        }

        let data = &body[Self::FIXED_LEN..];
        if data.len() > Self::MAX_DATA {
            return Err(ProtocolError::BodyTooLong { len: data.len(), max: Self::MAX_DATA });
        }

        Ok(Self {
            destination: body[0],
            source: body[1],
            pdu_s: body[2],
            pdu_f: body[3],
            dpp: body[4],
            control: body[5],
            timestamp_ms: u32::from_le_bytes([body[6], body[7], body[8], body[9]]),
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Serialize into a checksummed Type 2 datagram.
    pub fn to_datagram(&self) -> Result<BstDatagram> {
        if self.data.len() > Self::MAX_DATA {
            return Err(ProtocolError::BodyTooLong { len: self.data.len(), max: Self::MAX_DATA });
        }
        let mut body = Vec::with_capacity(Self::FIXED_LEN + self.data.len());
        body.push(self.destination);
        body.push(self.source);
        body.push(self.pdu_s);
        body.push(self.pdu_f);
        body.push(self.dpp);
        body.push(self.control);
        body.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        body.extend_from_slice(&self.data);
        BstDatagram::new(Self::BST_ID, body)
    }

    /// Data page, 2 bits.
    #[must_use]
    pub fn data_page(&self) -> u8 {
        self.dpp & 0x03
    }

    /// Bus priority, 3 bits.
    #[must_use]
    pub fn priority(&self) -> u8 {
        (self.dpp >> 2) & 0x07
    }

    /// Transport class of the frame.
    #[must_use]
    pub fn msg_type(&self) -> N2kMessageType {
        N2kMessageType::from_bits(self.control)
    }

    /// Capture direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.control & 0x08 == 0 { Direction::Received } else { Direction::Transmitted }
    }

    /// True when the frame originated inside the gateway itself.
    #[must_use]
    pub fn internal_source(&self) -> bool {
        self.control & 0x10 != 0
    }

    /// Fast-packet sequence identifier, 3 bits.
    #[must_use]
    pub fn fp_seq_id(&self) -> u8 {
        self.control >> 5
    }

    /// Parameter group number of this frame.
    #[must_use]
    pub fn pgn(&self) -> u32 {
        pgn::compute(self.data_page(), self.pdu_f, self.pdu_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bst95_decode_cog_sog() {
        // Compact CAN frame carrying PGN 129026 with eight data bytes.
        let body = [
            0x01, 0x20, 0x30, 0x02, 0xF8, 0x09, 0xFF, 0xFC, 0x37, 0x0A, 0x00, 0x10, 0xFF, 0xFF,
        ];
        let frame = Bst95::decode(&body).unwrap();

        assert_eq!(frame.timestamp, 0x2001);
        assert_eq!(frame.source, 0x30);
        assert_eq!(frame.pdu_s, 0x02);
        assert_eq!(frame.pdu_f, 0xF8);
        assert_eq!(frame.dppc, 0x09);
        assert_eq!(frame.data_page(), 1);
        assert_eq!(frame.priority(), 2);
        assert_eq!(frame.ts_resolution(), TimestampResolution::Millisecond);
        assert_eq!(frame.direction(), Direction::Received);
        assert_eq!(frame.pgn(), 129_026);
        assert_eq!(&frame.data[..], &[0xFF, 0xFC, 0x37, 0x0A, 0x00, 0x10, 0xFF, 0xFF]);
        assert_eq!(frame.destination(), None);
    }

    #[test]
    fn bst95_empty_and_full_payloads() {
        let empty = [0x00, 0x00, 0x10, 0x00, 0xEA, 0x00];
        let frame = Bst95::decode(&empty).unwrap();
        assert!(frame.data.is_empty());
        // PDU1: the specific byte is a destination.
        assert_eq!(frame.destination(), Some(0x00));

        let mut full = empty.to_vec();
        full.extend([0u8; 8]);
        assert!(Bst95::decode(&full).is_ok());

        full.push(0);
        assert!(matches!(
            Bst95::decode(&full),
            Err(ProtocolError::BodyTooLong { len: 9, max: 8 })
        ));
    }

    #[test]
    fn bstd0_decode_gnss() {
        // Modern frame carrying PGN 129029 (data page 1).
        let mut body = vec![0xFF, 0x23, 0x05, 0xF8, 0x09, 0x01, 0x10, 0x27, 0x00, 0x00];
        body.extend_from_slice(&[0xAB; 43]);
        let frame = BstD0::decode(&body).unwrap();

        assert_eq!(frame.data_page(), 1);
        assert_eq!(frame.priority(), 2);
        assert_eq!(frame.pgn(), 129_029);
        assert_eq!(frame.msg_type(), N2kMessageType::FastPacket);
        assert_eq!(frame.direction(), Direction::Received);
        assert!(!frame.internal_source());
        assert_eq!(frame.timestamp_ms, 10_000);
        assert_eq!(frame.data.len(), 43);
    }

    #[test]
    fn bst93_round_trip() {
        let frame = Bst93 {
            priority: 3,
            pdu_s: 0x05,
            pdu_f: 0xF8,
            data_page: 1,
            destination: 0xFF,
            source: 0x23,
            timestamp_ms: 123_456,
            data: Bytes::from_static(&[1, 2, 3, 4]),
        };
        let dg = frame.to_datagram().unwrap();
        assert_eq!(dg.bst_id, Bst93::BST_ID);

        let back = Bst93::decode(&dg.body).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.pgn(), (1 << 16) | (0xF8 << 8) | 0x05);
    }

    #[test]
    fn bst93_data_length_overrun() {
        let mut body = vec![0u8; 11];
        body[10] = 5;
        body.extend([0u8; 3]);
        assert_eq!(
            Bst93::decode(&body),
            Err(ProtocolError::DataLengthOverrun { declared: 5, available: 3 })
        );
    }

    #[test]
    fn bst93_masks_reserved_bits() {
        let mut body = vec![0u8; 11];
        body[0] = 0xFB; // priority bits plus garbage
        body[3] = 0xFD; // data page bits plus garbage
        let frame = Bst93::decode(&body).unwrap();
        assert_eq!(frame.priority, 0x03);
        assert_eq!(frame.data_page, 0x01);
    }

    #[test]
    fn bst94_pdu1_routes_destination() {
        let frame = Bst94::from_pgn(6, 0x00EA00, 0x42, Bytes::from_static(&[0xAA])).unwrap();
        assert_eq!(frame.pdu_s, 0x42);
        assert_eq!(frame.destination, 0x42);

        let dg = frame.to_datagram().unwrap();
        let back = Bst94::decode(&dg.body).unwrap();
        assert_eq!(back.pgn(), 0x00EA00);
    }

    #[test]
    fn bst94_pdu2_keeps_group_extension() {
        let frame = Bst94::from_pgn(2, 129_026, 0x42, Bytes::new()).unwrap();
        assert_eq!(frame.pdu_s, 0x02);
        // Destination still written to its slot for downstream routing.
        assert_eq!(frame.destination, 0x42);
        assert_eq!(frame.pgn(), 129_026);
    }

    #[test]
    fn dppc_pack_unpack() {
        let dppc =
            Bst95::pack_dppc(1, 2, TimestampResolution::Millisecond, Direction::Received);
        assert_eq!(dppc, 0x09);

        let dppc = Bst95::pack_dppc(
            3,
            7,
            TimestampResolution::Microsecond,
            Direction::Transmitted,
        );
        let frame = Bst95 {
            timestamp: 0,
            source: 0,
            pdu_s: 0,
            pdu_f: 0,
            dppc,
            data: Bytes::new(),
        };
        assert_eq!(frame.data_page(), 3);
        assert_eq!(frame.priority(), 7);
        assert_eq!(frame.ts_resolution(), TimestampResolution::Microsecond);
        assert_eq!(frame.direction(), Direction::Transmitted);
    }
}
