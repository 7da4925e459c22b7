//! System-status record grammar (unsolicited report `0xF2`).
//!
//! Variable-length record: a mandatory block of per-interface statistics,
//! then up to three optional tails (unidirectional-channel statistics, CAN
//! error counters, current operating mode). A tail that does not fully fit
//! in the remaining bytes is silently omitted; firmware revisions differ in
//! how much they append and the record stays readable across all of them.

use crate::errors::{ProtocolError, Result};

/// Statistics for one bidirectional interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndiStats {
    /// Receive bandwidth, percent.
    pub rx_bandwidth: u8,
    /// Receive processing load, percent.
    pub rx_load: u8,
    /// Frames removed by the receive filter.
    pub rx_filtered: u8,
    /// Frames dropped on receive.
    pub rx_dropped: u8,
    /// Transmit bandwidth, percent.
    pub tx_bandwidth: u8,
    /// Transmit processing load, percent.
    pub tx_load: u8,
}

/// Statistics for one unidirectional channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniStats {
    /// Channel bandwidth, percent.
    pub bandwidth: u8,
    /// Messages deleted from the channel buffer.
    pub deleted: u8,
    /// Channel processing load, percent.
    pub load: u8,
    /// Buffer pointer load, percent.
    pub pointer_load: u8,
}

/// CAN controller error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanStatus {
    /// Receive error counter.
    pub rx_errors: u8,
    /// Transmit error counter.
    pub tx_errors: u8,
    /// Controller flag bits.
    pub flags: u8,
}

/// Decoded system-status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    /// Per-interface statistics, one to sixteen entries.
    pub indi: Vec<IndiStats>,
    /// Unidirectional-channel statistics, up to eight entries. Empty when
    /// the tail was absent.
    pub uni: Vec<UniStats>,
    /// CAN error counters, when present.
    pub can: Option<CanStatus>,
    /// Current operating mode, when present.
    pub operating_mode: Option<u16>,
}

const INDI_LEN: usize = 6;
const UNI_LEN: usize = 4;
const CAN_LEN: usize = 3;

const MAX_INDI: u8 = 16;
const MAX_UNI: u8 = 8;

impl SystemStatus {
    /// Parse a status record from a response payload.
    ///
    /// # Errors
    ///
    /// - `CountOutOfRange` if either count field is outside its range
    /// - `TruncatedStatus` if the mandatory interface block is cut short
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (&count_indi, mut rest) = data
            .split_first()
            .ok_or(ProtocolError::TruncatedStatus { section: "interface", needed: 1, available: 0 })?;
        if !(1..=MAX_INDI).contains(&count_indi) {
            return Err(ProtocolError::CountOutOfRange {
                field: "interface",
                value: count_indi,
                min: 1,
                max: MAX_INDI,
            });
        }

        let indi_bytes = usize::from(count_indi) * INDI_LEN;
        if rest.len() < indi_bytes {
            return Err(ProtocolError::TruncatedStatus {
                section: "interface",
                needed: indi_bytes,
                available: rest.len(),
            });
        }
        let indi = rest[..indi_bytes]
            .chunks_exact(INDI_LEN)
            .map(|c| IndiStats {
                rx_bandwidth: c[0],
                rx_load: c[1],
                rx_filtered: c[2],
                rx_dropped: c[3],
                tx_bandwidth: c[4],
                tx_load: c[5],
            })
            .collect();
        rest = &rest[indi_bytes..];

        let mut status =
            Self { indi, uni: Vec::new(), can: None, operating_mode: None };

        // Optional tails from here on: stop at the first one that does not
        // fully fit.
        let Some((&count_uni, uni_rest)) = rest.split_first() else {
            return Ok(status);
        };
        if count_uni > MAX_UNI {
            return Err(ProtocolError::CountOutOfRange {
                field: "channel",
                value: count_uni,
                min: 0,
                max: MAX_UNI,
            });
        }
        let uni_bytes = usize::from(count_uni) * UNI_LEN;
        if uni_rest.len() < uni_bytes {
            return Ok(status);
        }
        status.uni = uni_rest[..uni_bytes]
            .chunks_exact(UNI_LEN)
            .map(|c| UniStats { bandwidth: c[0], deleted: c[1], load: c[2], pointer_load: c[3] })
            .collect();
        rest = &uni_rest[uni_bytes..];

        if rest.len() < CAN_LEN {
            return Ok(status);
        }
        status.can = Some(CanStatus { rx_errors: rest[0], tx_errors: rest[1], flags: rest[2] });
        rest = &rest[CAN_LEN..];

        if rest.len() >= 2 {
            status.operating_mode = Some(u16::from_le_bytes([rest[0], rest[1]]));
        }

        Ok(status)
    }
}
