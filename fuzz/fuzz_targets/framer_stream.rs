//! Fuzz target for the byte-stream framer and the composed decoder.
//!
//! The receive path faces an untrusted serial line; arbitrary bytes in any
//! chunking must never panic, never wedge the parser, and every completed
//! frame must round-trip through the frame encoder.
//!
//! # Invariants
//!
//! - `Framer::push` returns for every input; all failures are structured
//!   outputs, never panics
//! - Chunk boundaries are invisible: any split of the same stream yields
//!   the same outputs
//! - Re-encoding a parsed frame and re-parsing it reproduces the payload

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tidelink_proto::{
    encode_frame, FrameEvent, Framer, FramerConfig, StreamDecoder,
};

#[derive(Debug, Arbitrary)]
struct StreamInput {
    stream: Vec<u8>,
    split: usize,
    max_frame_size: u16,
}

fuzz_target!(|input: StreamInput| {
    let config = FramerConfig { max_frame_size: usize::from(input.max_frame_size).max(1) };

    // Whole-stream parse.
    let mut framer = Framer::new(config.clone());
    let mut whole = framer.push(&input.stream);

    // Split parse must produce identical outputs.
    let at = input.split % (input.stream.len() + 1);
    let mut framer = Framer::new(config.clone());
    let mut split = framer.push(&input.stream[..at]);
    split.extend(framer.push(&input.stream[at..]));
    assert_eq!(whole, split);

    // Every completed frame survives an encode/parse round trip.
    for event in whole.drain(..) {
        if let FrameEvent::Frame(payload) = event {
            let mut framer = Framer::new(FramerConfig { max_frame_size: payload.len().max(1) });
            let again = framer.push(&encode_frame(&payload));
            assert_eq!(again, vec![FrameEvent::Frame(payload)]);
        }
    }

    // The composed decoder must be equally unshakeable.
    let mut decoder = StreamDecoder::new(config);
    let _ = decoder.push(&input.stream);
});
