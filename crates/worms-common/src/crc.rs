// crc.rs -- 32-bit CRC over wire events (IEEE 802.3 polynomial)
// Delegates to the `crc` crate (CRC-32/ISO-HDLC is the IEEE variant).

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC_CALC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Compute the CRC32 of an entire block of data.
pub fn crc_block(data: &[u8]) -> u32 {
    CRC_CALC.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_check_value() {
        // The standard check value for CRC-32/ISO-HDLC over "123456789".
        assert_eq!(crc_block(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc_empty() {
        assert_eq!(crc_block(&[]), 0);
    }

    #[test]
    fn test_crc_consistency() {
        let data = b"NEW_GAME 800 600";
        assert_eq!(crc_block(data), crc_block(data));
        assert_ne!(crc_block(data), crc_block(b"NEW_GAME 800 601"));
    }
}
