//! Property-based tests for the framing and datagram layers.
//!
//! These verify the wire-level laws for ALL inputs, not just specific
//! captures: framing round-trips any payload, every DLE on the wire is
//! accounted for, and the checksum law holds for every datagram.

use bytes::Bytes;
use proptest::prelude::*;
use tidelink_proto::{
    checksum, encode_frame, BstDatagram, FrameEvent, Framer, FramerConfig,
};

/// Strategy for payloads within the default frame cap.
fn arbitrary_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

#[test]
fn prop_framing_round_trip() {
    proptest!(|(payload in arbitrary_payload())| {
        let wire = encode_frame(&payload);

        let mut framer = Framer::default();
        let events = framer.push(&wire);

        // PROPERTY: exactly one frame, no violations, payload identical.
        prop_assert_eq!(&events, &[FrameEvent::Frame(Bytes::from(payload))]);
    });
}

#[test]
fn prop_framing_round_trip_any_chunking() {
    proptest!(|(payload in arbitrary_payload(), split in any::<prop::sample::Index>())| {
        let wire = encode_frame(&payload);
        let at = split.index(wire.len() + 1);

        let mut framer = Framer::default();
        let mut events = framer.push(&wire[..at]);
        events.extend(framer.push(&wire[at..]));

        prop_assert_eq!(&events, &[FrameEvent::Frame(Bytes::from(payload))]);
    });
}

#[test]
fn prop_dle_transparency() {
    proptest!(|(payload in arbitrary_payload())| {
        let wire = encode_frame(&payload);

        // PROPERTY: every DLE on the wire is part of the two-byte header,
        // the two-byte trailer, or a doubled escape pair.
        let mut i = 2; // skip DLE/STX header
        let end = wire.len() - 2; // stop before DLE/ETX trailer
        while i < end {
            if wire[i] == 0x10 {
                prop_assert!(i + 1 < end, "lone DLE at end of payload region");
                prop_assert_eq!(wire[i + 1], 0x10, "unescaped DLE at offset {}", i);
                i += 2;
            } else {
                i += 1;
            }
        }
    });
}

#[test]
fn prop_back_to_back_frames() {
    proptest!(|(a in arbitrary_payload(), b in arbitrary_payload())| {
        let mut wire = encode_frame(&a);
        wire.extend(encode_frame(&b));

        let mut framer = Framer::default();
        let events = framer.push(&wire);
        prop_assert_eq!(
            &events,
            &[FrameEvent::Frame(Bytes::from(a)), FrameEvent::Frame(Bytes::from(b))]
        );
    });
}

#[test]
fn prop_datagram_round_trip() {
    proptest!(|(bst_id in any::<u8>(), body in prop::collection::vec(any::<u8>(), 0..255))| {
        let dg = BstDatagram::new(bst_id, body).unwrap();
        let wire = dg.encode();

        // PROPERTY: the checksum law holds over the full datagram.
        prop_assert!(checksum::verify(&wire));

        let back = BstDatagram::decode(&wire).unwrap();
        prop_assert_eq!(back, dg);
    });
}

#[test]
fn prop_full_stack_round_trip() {
    proptest!(|(bst_id in any::<u8>(), body in prop::collection::vec(any::<u8>(), 0..255))| {
        let dg = BstDatagram::new(bst_id, body).unwrap();
        let wire = encode_frame(&dg.encode());

        let mut framer = Framer::default();
        let events = framer.push(&wire);
        prop_assert_eq!(events.len(), 1);
        prop_assert!(matches!(&events[0], FrameEvent::Frame(_)));
        if let FrameEvent::Frame(payload) = &events[0] {
            prop_assert_eq!(BstDatagram::decode(payload).unwrap(), dg);
        }
    });
}

/// Framing round-trip with an embedded DLE, against captured wire bytes.
#[test]
fn round_trip_with_embedded_dle() {
    let body = [
        0x95, 0x1E, 0x01, 0x20, 0x30, 0x02, 0xF8, 0x09, 0xFF, 0xFC, 0x37, 0x0A, 0x00, 0x10,
        0xFF, 0xFF,
    ];
    assert_eq!(checksum::zero_sum(&body), 0xAF);

    let mut payload = body.to_vec();
    payload.push(0xAF);
    let wire = encode_frame(&payload);
    // The embedded 0x10 is doubled on the wire.
    assert_eq!(
        wire,
        hex::decode("1002951e01203002f809fffc370a001010ffffaf1003").unwrap()
    );

    let mut framer = Framer::default();
    let events = framer.push(&wire);
    assert_eq!(events, vec![FrameEvent::Frame(Bytes::copy_from_slice(&payload))]);
    assert!(checksum::verify(&payload));
}

/// A checksum byte that happens to equal DLE gets escaped like any other
/// byte; decode unescapes before verification.
#[test]
fn checksum_byte_equal_to_dle() {
    // Pick a body whose zero-sum checksum is exactly 0x10.
    let body = vec![0x42, 0xAE];
    assert_eq!(checksum::zero_sum(&body), 0x10);

    let mut payload = body.clone();
    payload.push(0x10);
    let wire = encode_frame(&payload);
    // Trailing checksum doubled on the wire.
    assert_eq!(&wire[wire.len() - 4..], &[0x10, 0x10, 0x10, 0x03]);

    let mut framer = Framer::default();
    let events = framer.push(&wire);
    assert_eq!(events, vec![FrameEvent::Frame(Bytes::from(payload))]);
}

/// A maximum-size Type 2 datagram passes a framer configured for it.
#[test]
fn max_type2_frame_accepted() {
    let mut body = vec![0xFF, 0x23, 0x05, 0xF8, 0x09, 0x00];
    body.extend_from_slice(&10_000u32.to_le_bytes());
    body.extend(std::iter::repeat_n(0x5A, 1785));
    let dg = BstDatagram::new(0xD0, body).unwrap();
    assert_eq!(dg.store_length, 1799);

    let wire = encode_frame(&dg.encode());
    let mut framer = Framer::new(FramerConfig { max_frame_size: 2048 });
    let events = framer.push(&wire);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], FrameEvent::Frame(_)));

    // The default cap is too small for this traffic.
    let mut strict = Framer::default();
    let events = strict.push(&wire);
    assert!(events
        .iter()
        .all(|e| !matches!(e, FrameEvent::Frame(_))));
}
