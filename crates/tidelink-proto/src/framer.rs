//! DLE/STX/ETX byte-stream framing.
//!
//! The framer turns an arbitrarily chunked byte stream into discrete payload
//! frames. A frame starts with `DLE STX`, ends with `DLE ETX`, and any `DLE`
//! inside the payload is doubled on the wire. The framer is a pure push
//! parser: feed it bytes, collect the frames and violations it produced.
//! No I/O, no shared state; the receive task owns it outright.
//!
//! # State machine
//!
//! ```text
//!            DLE            STX
//! ┌──────┐ ───────> ┌────────┐ ───────> ┌─────────┐
//! │ Idle │ <─────── │ GotDle │          │ InFrame │ <────┐
//! └──────┘  other   └────────┘          └─────────┘      │ DLE DLE
//!     ^                                      │ DLE       │ (literal 0x10)
//!     │              DLE ETX (finalize)  ┌───┴──────────┐│
//!     └───────────────────────────────── │ InFrameGotDle│┘
//!                                        └──────────────┘
//! ```
//!
//! A `DLE STX` seen mid-frame aborts the frame in progress and starts a new
//! one; a `DLE` followed by anything else discards the frame. Both are
//! reported as violations and the framer keeps parsing: all framing errors
//! are recoverable.

use bytes::{Bytes, BytesMut};

use crate::errors::ProtocolError;

/// Escape / control lead-in byte.
pub const DLE: u8 = 0x10;

/// Start-of-frame control byte (after DLE).
pub const STX: u8 = 0x02;

/// End-of-frame control byte (after DLE).
pub const ETX: u8 = 0x03;

/// Default cap on one frame's unescaped payload.
///
/// Fits any Type 1 datagram and small Type 2 traffic. Raise to 2048 or more
/// when large BST-D0 messages are expected.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512;

/// Framer tuning knobs.
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Maximum accepted unescaped frame payload in bytes.
    pub max_frame_size: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self { max_frame_size: DEFAULT_MAX_FRAME_SIZE }
    }
}

/// Parser states. See the module diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scanning for a frame start.
    Idle,
    /// Saw DLE outside a frame.
    GotDle,
    /// Accumulating payload bytes.
    InFrame,
    /// Saw DLE inside a frame; next byte decides.
    InFrameGotDle,
}

/// One output of a [`Framer::push`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete unescaped frame payload (checksummed datagram bytes).
    Frame(Bytes),

    /// A framing violation. The framer has already recovered.
    Malformed(ProtocolError),
}

/// Stateful DLE/STX/ETX stream parser.
#[derive(Debug)]
pub struct Framer {
    state: State,
    buf: BytesMut,
    config: FramerConfig,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(FramerConfig::default())
    }
}

impl Framer {
    /// Create a framer with the given configuration.
    #[must_use]
    pub fn new(config: FramerConfig) -> Self {
        Self { state: State::Idle, buf: BytesMut::new(), config }
    }

    /// Feed a chunk of raw stream bytes, returning the frames and
    /// violations it completed, in stream order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        let mut out = Vec::new();
        for &b in bytes {
            self.push_byte(b, &mut out);
        }
        out
    }

    /// Drop any partial frame and return to the idle state.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.buf.clear();
    }

    /// True while no frame is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    fn push_byte(&mut self, b: u8, out: &mut Vec<FrameEvent>) {
        match self.state {
            State::Idle => {
                if b == DLE {
                    self.state = State::GotDle;
                }
                // Anything else is inter-frame noise; discard silently.
            },
            State::GotDle => match b {
                STX => {
                    self.buf.clear();
                    self.state = State::InFrame;
                },
                DLE => {
                    // Escaped data byte with no open frame; keep waiting for
                    // a control byte.
                    tracing::warn!("escaped byte outside frame, ignoring");
                },
                other => {
                    tracing::warn!(byte = other, "unexpected byte after frame lead-in");
                    self.state = State::Idle;
                },
            },
            State::InFrame => {
                if b == DLE {
                    self.state = State::InFrameGotDle;
                } else {
                    self.append(b, out);
                }
            },
            State::InFrameGotDle => match b {
                ETX => {
                    let frame = self.buf.split().freeze();
                    out.push(FrameEvent::Frame(frame));
                    self.state = State::Idle;
                },
                DLE => {
                    self.state = State::InFrame;
                    self.append(DLE, out);
                },
                STX => {
                    out.push(FrameEvent::Malformed(ProtocolError::FrameAborted));
                    self.buf.clear();
                    self.state = State::InFrame;
                },
                other => {
                    out.push(FrameEvent::Malformed(ProtocolError::InvalidEscape { byte: other }));
                    self.buf.clear();
                    self.state = State::Idle;
                },
            },
        }
    }

    /// Append one unescaped payload byte, enforcing the size cap.
    fn append(&mut self, b: u8, out: &mut Vec<FrameEvent>) {
        self.buf.extend_from_slice(&[b]);
        if self.buf.len() > self.config.max_frame_size {
            out.push(FrameEvent::Malformed(ProtocolError::FrameTooLarge {
                size: self.buf.len(),
                max: self.config.max_frame_size,
            }));
            self.buf.clear();
            self.state = State::Idle;
        }
    }
}

/// Wrap an unescaped payload in frame markers, doubling every DLE byte.
///
/// The payload must already carry its checksum; framing never alters or
/// re-checksums the data.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    // Worst case every byte is a DLE plus the four marker bytes.
    let mut out = Vec::with_capacity(payload.len() * 2 + 4);
    out.push(DLE);
    out.push(STX);
    for &b in payload {
        if b == DLE {
            out.push(DLE);
        }
        out.push(b);
    }
    out.push(DLE);
    out.push(ETX);
    out
}
