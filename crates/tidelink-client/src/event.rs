//! Events a session delivers to its user.

use tidelink_proto::BstMessage;

/// One decoded message, tagged with its layer and class names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Originating layer: `"bst"` for plain datagram traffic, `"bem"` for
    /// the extended command/response layer.
    pub protocol: &'static str,

    /// Message class name, e.g. `"bst95"` or `"bem-response"`.
    pub message_type: &'static str,

    /// The decoded message itself.
    pub payload: BstMessage,
}

impl From<BstMessage> for ParsedMessage {
    fn from(payload: BstMessage) -> Self {
        Self {
            protocol: if payload.is_bem() { "bem" } else { "bst" },
            message_type: payload.message_type(),
            payload,
        }
    }
}

/// What a session hands to its event channel, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A decoded message from the device.
    Message(ParsedMessage),

    /// One device status datum, decoded out of an unsolicited status
    /// report.
    DeviceStatus {
        /// Status key, e.g. `"operating_mode"`.
        key: &'static str,
        /// Rendered value.
        value: String,
    },
}
