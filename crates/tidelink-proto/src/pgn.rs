//! Parameter group number arithmetic.
//!
//! An NMEA 2000 PGN is an 18-bit value assembled from the data page and the
//! two PDU fields of a CAN identifier. The PDU format byte selects the
//! addressing mode: formats below 240 are PDU1 (peer-to-peer, the PDU
//! specific byte carries a destination address and is *not* part of the
//! PGN), formats 240 and above are PDU2 (broadcast, the PDU specific byte is
//! a group extension folded into the PGN).

use crate::errors::{ProtocolError, Result};

/// First PDU format value with PDU2 (group extension) addressing.
pub const PDU2_FORMAT_MIN: u8 = 240;

/// Highest representable PGN (18 bits: 2-bit data page, two bytes).
pub const PGN_MAX: u32 = 0x3_FFFF;

/// True when `pdu_f` uses PDU1 (destination-addressed) semantics.
#[must_use]
pub fn is_pdu1(pdu_f: u8) -> bool {
    pdu_f < PDU2_FORMAT_MIN
}

/// Assemble a PGN from its CAN-side fields.
///
/// For PDU1 formats the PDU specific byte is a destination address and does
/// not contribute to the PGN; its slot in the 18-bit value stays zero.
#[must_use]
pub fn compute(data_page: u8, pdu_f: u8, pdu_s: u8) -> u32 {
    let dp = u32::from(data_page & 0x03);
    let pf = u32::from(pdu_f);
    if is_pdu1(pdu_f) {
        (dp << 16) | (pf << 8)
    } else {
        (dp << 16) | (pf << 8) | u32::from(pdu_s)
    }
}

/// CAN-side fields recovered from a PGN, ready for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgnFields {
    /// 2-bit data page.
    pub data_page: u8,
    /// PDU format byte.
    pub pdu_f: u8,
    /// PDU specific byte: the destination for PDU1, the group extension for
    /// PDU2.
    pub pdu_s: u8,
}

/// Split an 18-bit PGN back into encodable fields.
///
/// For PDU1 PGNs the caller's `destination` is written into the PDU
/// specific slot; for PDU2 it is ignored here (the low PGN byte wins).
///
/// # Errors
///
/// - `ProtocolError::PgnOutOfRange` if `pgn` exceeds 18 bits
pub fn split(pgn: u32, destination: u8) -> Result<PgnFields> {
    if pgn > PGN_MAX {
        return Err(ProtocolError::PgnOutOfRange(pgn));
    }

    let data_page = ((pgn >> 16) & 0x03) as u8;
    let pdu_f = ((pgn >> 8) & 0xFF) as u8;
    let pdu_s = if is_pdu1(pdu_f) { destination } else { (pgn & 0xFF) as u8 };

    Ok(PgnFields { data_page, pdu_f, pdu_s })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn pdu2_includes_specific_byte() {
        // COG/SOG rapid update: data page 1, format 0xF8, specific 0x02.
        assert_eq!(compute(1, 0xF8, 0x02), 129_026);
    }

    #[test]
    fn pdu1_masks_specific_byte() {
        // ISO request-style PGN: the specific byte is a destination.
        assert_eq!(compute(0, 0xEA, 0x35), 0x00EA00);
    }

    #[test]
    fn boundary_format_239_vs_240() {
        assert_eq!(compute(0, 239, 0x12), 239 << 8);
        assert_eq!(compute(0, 240, 0x12), (240 << 8) | 0x12);
    }

    #[test]
    fn split_rejects_wide_pgn() {
        assert_eq!(split(PGN_MAX + 1, 0), Err(ProtocolError::PgnOutOfRange(PGN_MAX + 1)));
    }

    proptest! {
        #[test]
        fn round_trip(
            data_page in 0u8..=3,
            pdu_f in any::<u8>(),
            pdu_s in any::<u8>(),
            destination in any::<u8>(),
        ) {
            let pgn = compute(data_page, pdu_f, pdu_s);
            prop_assert!(pgn <= PGN_MAX);

            let fields = split(pgn, destination).unwrap();
            prop_assert_eq!(fields.data_page, data_page);
            prop_assert_eq!(fields.pdu_f, pdu_f);
            if is_pdu1(pdu_f) {
                // Destination survives; the original pdu_s was an address,
                // not part of the PGN.
                prop_assert_eq!(fields.pdu_s, destination);
            } else {
                prop_assert_eq!(fields.pdu_s, pdu_s);
            }
        }
    }
}
