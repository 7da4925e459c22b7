//! Wire protocol layer for marine gateway traffic.
//!
//! Implements the three stacked wire layers a gateway speaks over its
//! serial link, bottom up:
//!
//! - **Framing** ([`framer`]): DLE/STX/ETX byte stuffing turning a raw
//!   stream into discrete payload frames.
//! - **Datagrams** ([`datagram`]): the length-prefixed `{id, length, body,
//!   checksum}` container inside each frame, protected by a zero-sum
//!   checksum.
//! - **Messages** ([`messages`]): typed decode of N2K/CAN frames
//!   (`0x93`/`0x94`/`0x95`/`0xD0`) and the extended command/response layer
//!   (`0xA0`..=`0xA8`), plus PGN/PDU arithmetic ([`pgn`]).
//!
//! [`stream::StreamDecoder`] composes all three into a single push parser.
//! Everything here is sans-IO and single-threaded by design: a session
//! layer owns one decoder per stream and feeds it received chunks. Every
//! decode failure is a structured, recoverable [`ProtocolError`]; malformed
//! input never panics and never wedges the parser.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod checksum;
pub mod datagram;
pub mod errors;
pub mod framer;
pub mod messages;
pub mod pgn;
pub mod stream;

pub use datagram::BstDatagram;
pub use errors::{ProtocolError, Result};
pub use framer::{encode_frame, FrameEvent, Framer, FramerConfig, DEFAULT_MAX_FRAME_SIZE};
pub use messages::{
    bem::{self, BemCommand, BemResponse, BemResponseHeader},
    Bst93, Bst94, Bst95, BstD0, BstMessage, CanStatus, Direction, IndiStats, N2kMessageType,
    SystemStatus, TimestampResolution, UniStats,
};
pub use stream::{StreamDecoder, StreamEvent};
