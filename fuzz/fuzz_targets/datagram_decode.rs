//! Fuzz target for datagram parsing and typed message dispatch.
//!
//! # Invariants
//!
//! - `BstDatagram::decode` never panics; every rejection is a structured
//!   error
//! - An accepted datagram re-encodes to the exact input bytes
//! - Typed dispatch never panics on any accepted datagram

#![no_main]

use libfuzzer_sys::fuzz_target;
use tidelink_proto::{BstDatagram, BstMessage};

fuzz_target!(|data: &[u8]| {
    let Ok(datagram) = BstDatagram::decode(data) else {
        return;
    };

    // Accepted datagrams are canonical: re-encoding reproduces the input.
    assert_eq!(datagram.encode(), data);

    let _ = BstMessage::decode(datagram);
});
