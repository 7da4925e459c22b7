//! Zero-sum checksum over datagram bytes.
//!
//! The sender appends one byte chosen so that the 8-bit sum of the whole
//! datagram, checksum included, is zero modulo 256. Verification is a single
//! wrapping sum compared against zero. The checksum is always computed over
//! unescaped bytes; DLE stuffing happens afterwards at the framing layer.

/// Compute the checksum byte for `bytes` so that appending it makes the
/// modular sum zero.
#[must_use]
pub fn zero_sum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Verify that `bytes` (checksum byte included) sum to zero modulo 256.
#[must_use]
pub fn verify(bytes: &[u8]) -> bool {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_vector() {
        // Wire capture from a compact CAN frame; see the framing round-trip
        // scenario in the integration tests.
        let body = [
            0x95, 0x1E, 0x01, 0x20, 0x30, 0x02, 0xF8, 0x09, 0xFF, 0xFC, 0x37, 0x0A, 0x00, 0x10,
            0xFF, 0xFF,
        ];
        assert_eq!(zero_sum(&body), 0xAF);

        let mut with_checksum = body.to_vec();
        with_checksum.push(0xAF);
        assert!(verify(&with_checksum));
    }

    #[test]
    fn empty_input() {
        assert_eq!(zero_sum(&[]), 0);
        assert!(verify(&[]));
    }

    proptest! {
        #[test]
        fn checksum_law(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let cs = zero_sum(&data);
            let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            // Appending the checksum always zeroes the modular sum.
            prop_assert_eq!(sum.wrapping_add(cs), 0);

            let mut full = data.clone();
            full.push(cs);
            prop_assert!(verify(&full));
        }

        #[test]
        fn corruption_detected(data in prop::collection::vec(any::<u8>(), 1..512), delta in 1u8..=255) {
            let cs = zero_sum(&data);
            let mut full = data;
            full.push(cs);
            let last = full.len() - 1;
            full[last] = full[last].wrapping_add(delta);
            prop_assert!(!verify(&full));
        }
    }
}
