//! Fuzz target for response-header parsing and the status-record grammar.
//!
//! # Invariants
//!
//! - `BemResponse::decode` never panics; short bodies are structured
//!   errors
//! - Header accessors are total over every accepted 12-byte pattern
//! - `SystemStatus::decode` never panics and never over-reads

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use tidelink_proto::{BemResponse, SystemStatus};

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = BemResponse::decode(0xA0, Bytes::copy_from_slice(data)) {
        let _ = response.header.model_id();
        let _ = response.header.serial_number();
        let _ = response.header.error_code();
        let _ = response.operating_mode();
        let _ = response.to_datagram();
    }

    let _ = SystemStatus::decode(data);
});
