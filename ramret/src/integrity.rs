//! Self-verifying checksums for retained byte ranges.
//!
//! A retained record is stored as `value_bytes ++ checksum_bytes`, where
//! `checksum_bytes` is the little-endian CRC-32/ISO-HDLC of `value_bytes`.
//! The residue of a CRC is what you get from running it over a message
//! followed by its own CRC. For CRC-32/ISO-HDLC the post-final-xor residue is
//! [`RESIDUE`], so validity is a single pass over the whole record with no
//! separate compare against the stored field.

use crate::Error;
use crate::retention::{RetentionController, RetentionHardware};
use crate::topology::MemoryRange;

/// Size of the checksum field at the end of every record.
pub const CHECKSUM_SIZE: usize = core::mem::size_of::<u32>();

/// CRC-32/ISO-HDLC of any message followed by its own little-endian CRC.
pub const RESIDUE: u32 = 0x2144_DF1C;

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// CRC-32/ISO-HDLC of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Whether `bytes[..checksum_offset + 4]` satisfies the residue check.
///
/// # Panics
///
/// Panics if `checksum_offset + 4 > bytes.len()`.
pub fn is_intact(bytes: &[u8], checksum_offset: usize) -> bool {
    checksum(&bytes[..checksum_offset + CHECKSUM_SIZE]) == RESIDUE
}

/// Recomputes the checksum of `bytes[..checksum_offset]` and stores it
/// little-endian in the 4 bytes at `checksum_offset`.
///
/// This does not touch retention. Call
/// [`RetentionController::enable`] afterwards, or use
/// [`RetainedRecord::flush`](crate::RetainedRecord::flush) which does both.
///
/// # Panics
///
/// Panics if `checksum_offset + 4 > bytes.len()`.
pub fn update(bytes: &mut [u8], checksum_offset: usize) {
    let crc = checksum(&bytes[..checksum_offset]);
    bytes[checksum_offset..checksum_offset + CHECKSUM_SIZE].copy_from_slice(&crc.to_le_bytes());
}

/// Checks whether `bytes` holds data written by [`update`], resetting it to
/// zero if it does not, and re-arms retention for all of `bytes`.
///
/// Returns `Ok(true)` if the residue check passed and the buffer was left
/// alone, `Ok(false)` if the whole buffer (checksum included) was zeroed.
/// A zeroed buffer stays invalid until [`update`] is called on it.
///
/// Retention is armed in both cases. Nordic documents that
/// the retention configuration is not kept through System OFF, even though
/// it can sometimes be observed to survive.
///
/// # Errors
///
/// [`Error::InvalidRange`] if `bytes` is not inside the controller's RAM, in
/// which case no retention registers are written. The buffer has still been
/// checked, and zeroed if it was invalid.
///
/// # Panics
///
/// Panics if `checksum_offset + 4 > bytes.len()`.
pub fn validate<H: RetentionHardware>(
    bytes: &mut [u8],
    checksum_offset: usize,
    controller: &mut RetentionController<H>,
) -> Result<bool, Error> {
    let valid = is_intact(bytes, checksum_offset);
    if !valid {
        bytes.fill(0);
    }

    controller.enable(MemoryRange::of_bytes(bytes))?;

    Ok(valid)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use quickcheck::quickcheck;

    use super::*;
    use crate::test_hardware::{RecordingHardware, TestRam};

    #[test]
    fn crc_matches_the_standard_check_value() {
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn zeroed_buffer_is_not_intact() {
        assert!(!is_intact(&[0; 8], 4));
    }

    #[test]
    fn update_stores_little_endian_crc_of_the_value_only() {
        let mut bytes = [5, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD];
        update(&mut bytes, 4);

        assert_eq!(bytes[..4], [5, 0, 0, 0]);
        assert_eq!(bytes[4..], checksum(&[5, 0, 0, 0]).to_le_bytes());
        assert!(is_intact(&bytes, 4));
    }

    #[test]
    fn trailing_bytes_after_the_checksum_are_not_checked() {
        let mut bytes = [1, 2, 3, 0, 0, 0, 0, 0x55];
        update(&mut bytes, 3);
        bytes[7] = 0x66;

        assert!(is_intact(&bytes, 3));
    }

    #[test]
    fn zero_length_value_has_a_fixed_checksum() {
        let mut bytes = [0u8; 4];
        update(&mut bytes, 0);

        assert_eq!(u32::from_le_bytes(bytes), checksum(&[]));
        assert!(is_intact(&bytes, 0));
    }

    #[test]
    #[should_panic]
    fn checksum_offset_past_the_end_panics() {
        let mut bytes = [0u8; 8];
        update(&mut bytes, 5);
    }

    #[test]
    fn garbage_outside_ram_is_still_reset() {
        let ram = TestRam::new();
        let mut controller = RetentionController::new(ram.topology(), RecordingHardware::new());

        let mut outside = [0xA5u8; 8];
        assert_eq!(
            validate(&mut outside, 4, &mut controller),
            Err(Error::InvalidRange)
        );
        assert_eq!(outside, [0; 8]);
        assert!(controller.hardware().calls().is_empty());
    }

    #[test]
    fn intact_buffer_outside_ram_is_left_alone() {
        let ram = TestRam::new();
        let mut controller = RetentionController::new(ram.topology(), RecordingHardware::new());

        let mut outside = [1u8, 2, 3, 4, 0, 0, 0, 0];
        update(&mut outside, 4);
        let before = outside;

        assert_eq!(
            validate(&mut outside, 4, &mut controller),
            Err(Error::InvalidRange)
        );
        assert_eq!(outside, before);
    }

    /// Where a generated buffer is placed in test RAM.
    fn placed(ram: &mut TestRam, offset: u16, len: usize) -> &mut [u8] {
        let begin = usize::from(offset);
        &mut ram.bytes_mut()[begin..begin + len]
    }

    quickcheck! {
        fn update_then_check_passes(value: Vec<u8>) -> bool {
            let mut bytes = value.clone();
            bytes.extend_from_slice(&[0; CHECKSUM_SIZE]);

            update(&mut bytes, value.len());
            is_intact(&bytes, value.len()) && bytes[..value.len()] == value[..]
        }

        fn foreign_checksum_fails(value: Vec<u8>, stored: u32) -> bool {
            if stored == checksum(&value) {
                return true;
            }

            let mut bytes = value.clone();
            bytes.extend_from_slice(&stored.to_le_bytes());
            !is_intact(&bytes, value.len())
        }

        fn any_single_bit_flip_is_detected(value: Vec<u8>, bit: usize) -> bool {
            let mut bytes = value.clone();
            bytes.extend_from_slice(&[0; CHECKSUM_SIZE]);
            update(&mut bytes, value.len());

            let bit = bit % (bytes.len() * 8);
            bytes[bit / 8] ^= 1 << (bit % 8);
            !is_intact(&bytes, value.len())
        }

        fn validate_after_update_keeps_the_buffer(
            value: Vec<u8>,
            trailing: Vec<u8>,
            offset: u16
        ) -> bool {
            let mut ram = TestRam::new();
            let mut controller =
                RetentionController::new(ram.topology(), RecordingHardware::new());

            let checksum_offset = value.len();
            let len = checksum_offset + CHECKSUM_SIZE + trailing.len();
            let bytes = placed(&mut ram, offset, len);
            bytes[..checksum_offset].copy_from_slice(&value);
            bytes[checksum_offset + CHECKSUM_SIZE..].copy_from_slice(&trailing);
            update(bytes, checksum_offset);
            let before = bytes.to_vec();

            validate(bytes, checksum_offset, &mut controller) == Ok(true)
                && bytes[..] == before[..]
                && !controller.hardware().calls().is_empty()
        }

        fn validate_zeroes_the_whole_buffer_on_mismatch(
            value: Vec<u8>,
            stored: u32,
            trailing: Vec<u8>,
            offset: u16
        ) -> bool {
            if stored == checksum(&value) {
                return true;
            }

            let mut ram = TestRam::new();
            let mut controller =
                RetentionController::new(ram.topology(), RecordingHardware::new());

            let checksum_offset = value.len();
            let len = checksum_offset + CHECKSUM_SIZE + trailing.len();
            let bytes = placed(&mut ram, offset, len);
            bytes[..checksum_offset].copy_from_slice(&value);
            bytes[checksum_offset..checksum_offset + CHECKSUM_SIZE]
                .copy_from_slice(&stored.to_le_bytes());
            bytes[checksum_offset + CHECKSUM_SIZE..].copy_from_slice(&trailing);

            validate(bytes, checksum_offset, &mut controller) == Ok(false)
                && bytes.iter().all(|&b| b == 0)
        }
    }
}
