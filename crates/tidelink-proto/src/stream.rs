//! Composed byte-stream decoder.
//!
//! Glues the framing, datagram, and message layers into one push parser:
//! raw transport bytes in, typed messages and recoverable violations out.
//! A session owns one decoder per stream and drives it from its receive
//! task; nothing here is shared or async.

use crate::{
    datagram::BstDatagram,
    errors::ProtocolError,
    framer::{FrameEvent, Framer, FramerConfig},
    messages::BstMessage,
};

/// One output of a [`StreamDecoder::push`] call, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fully decoded message.
    Message(BstMessage),

    /// A recoverable violation: bad framing, bad checksum, or a supported
    /// message class with an undecodable body. The byte stream continues.
    Malformed(ProtocolError),
}

/// Push parser over the full receive stack.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    framer: Framer,
}

impl StreamDecoder {
    /// Create a decoder with the given framing limits.
    #[must_use]
    pub fn new(config: FramerConfig) -> Self {
        Self { framer: Framer::new(config) }
    }

    /// Feed received bytes; collect every message and violation they
    /// complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.framer
            .push(bytes)
            .into_iter()
            .map(|event| match event {
                FrameEvent::Frame(payload) => {
                    match BstDatagram::decode(&payload).and_then(BstMessage::decode) {
                        Ok(message) => StreamEvent::Message(message),
                        Err(err) => StreamEvent::Malformed(err),
                    }
                },
                FrameEvent::Malformed(err) => StreamEvent::Malformed(err),
            })
            .collect()
    }

    /// Drop any partial frame state.
    pub fn reset(&mut self) {
        self.framer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::encode_frame;

    #[test]
    fn wire_to_typed_message() {
        let dg = BstDatagram::new(0x95, vec![0x01, 0x20, 0x30, 0x02, 0xF8, 0x09, 0xAA]).unwrap();
        let wire = encode_frame(&dg.encode());

        let mut decoder = StreamDecoder::default();
        let events = decoder.push(&wire);
        assert_eq!(events.len(), 1);
        let StreamEvent::Message(BstMessage::Bst95(frame)) = &events[0] else {
            panic!("expected a compact CAN frame, got {events:?}");
        };
        assert_eq!(frame.pgn(), 129_026);
    }

    #[test]
    fn aborted_then_valid_frame() {
        // First frame cut off by a new frame start; second decodes fine.
        let dg = BstDatagram::new(0x93, {
            let mut body = vec![0u8; 11];
            body[10] = 0;
            body
        })
        .unwrap();

        let mut wire = vec![0x10, 0x02, 0x93, 0x02, 0xAA, 0xBB, 0x00];
        wire.extend(encode_frame(&dg.encode()));

        let mut decoder = StreamDecoder::default();
        let events = decoder.push(&wire);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Malformed(ProtocolError::FrameAborted));
        assert!(matches!(&events[1], StreamEvent::Message(BstMessage::Bst93(_))));
    }

    #[test]
    fn checksum_failure_is_recoverable() {
        let mut raw = BstDatagram::new(0x95, vec![0, 0, 0, 0, 0, 0]).unwrap().encode();
        let last = raw.len() - 1;
        raw[last] = raw[last].wrapping_add(1);

        let good = BstDatagram::new(0x95, vec![0, 0, 0, 0, 0, 0]).unwrap();
        let mut wire = encode_frame(&raw);
        wire.extend(encode_frame(&good.encode()));

        let mut decoder = StreamDecoder::default();
        let events = decoder.push(&wire);
        assert_eq!(
            events[0],
            StreamEvent::Malformed(ProtocolError::ChecksumMismatch { bst_id: 0x95 })
        );
        assert!(matches!(&events[1], StreamEvent::Message(BstMessage::Bst95(_))));
    }
}
