//! Static device tables.
//!
//! Closed enumerations of known model identifiers and operating modes,
//! rendered as display names. Unknown values fall back to formatted
//! placeholders by range instead of failing: firmware ships new modes
//! faster than this table updates.

use std::borrow::Cow;

/// Display name for a device model identifier.
#[must_use]
pub fn model_name(model_id: u16) -> Cow<'static, str> {
    match model_id {
        0x0001 => Cow::Borrowed("NDC-4"),
        0x0002 => Cow::Borrowed("USG-1"),
        0x000A => Cow::Borrowed("NGW-1"),
        0x000E => Cow::Borrowed("NGT-1"),
        0x0011 => Cow::Borrowed("EMU-1"),
        0x0015 => Cow::Borrowed("W2K-1"),
        other => Cow::Owned(format!("Model-{other:#06X}")),
    }
}

/// Display name for an operating mode.
#[must_use]
pub fn operating_mode_name(mode: u16) -> Cow<'static, str> {
    match mode {
        0x0000 => Cow::Borrowed("Initialising"),
        0x0001 => Cow::Borrowed("Normal"),
        0x0002 => Cow::Borrowed("Receive All"),
        0x0003 => Cow::Borrowed("Transfer"),
        0x0203 => Cow::Borrowed("Receive All Transfer"),
        mode if mode < 0x4000 => Cow::Borrowed("Predefined Mode"),
        _ => Cow::Borrowed("User Mode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models() {
        assert_eq!(model_name(0x000E), "NGT-1");
        assert_eq!(model_name(0x0015), "W2K-1");
    }

    #[test]
    fn unknown_model_formatted() {
        assert_eq!(model_name(0xBEEF), "Model-0xBEEF");
    }

    #[test]
    fn mode_ranges() {
        assert_eq!(operating_mode_name(0x0001), "Normal");
        assert_eq!(operating_mode_name(0x1234), "Predefined Mode");
        assert_eq!(operating_mode_name(0x8001), "User Mode");
    }
}
