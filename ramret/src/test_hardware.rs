extern crate std;

use std::boxed::Box;
use std::vec::Vec;

use crate::retention::RetentionHardware;
use crate::topology::{
    MemoryRange, NRF52_LARGE_SECTIONS, NRF52_SMALL_BLOCK_COUNT, NRF52_SMALL_SECTIONS,
    RamTopology,
};

/// A [`RetentionHardware`] that remembers every call made to it and keeps
/// the resulting retention bits per block.
#[derive(Debug, Default)]
pub struct RecordingHardware {
    calls: Vec<(crate::SectionBitmask, bool)>,
    retained: Vec<u32>,
}

impl RecordingHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call in the order it was made.
    pub fn calls(&self) -> &[(crate::SectionBitmask, bool)] {
        &self.calls
    }

    /// The retention bits currently set for `block`.
    pub fn retained(&self, block: usize) -> u32 {
        self.retained.get(block).copied().unwrap_or(0)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl RetentionHardware for RecordingHardware {
    fn set_block_retention(&mut self, bits: crate::SectionBitmask, enable: bool) {
        if self.retained.len() <= bits.block_index {
            self.retained.resize(bits.block_index + 1, 0);
        }

        let block = &mut self.retained[bits.block_index];
        if enable {
            *block |= bits.mask;
        } else {
            *block &= !bits.mask;
        }

        self.calls.push((bits, enable));
    }
}

/// Heap memory posing as an nRF52 RAM, so records living in it can be
/// validated and retained like on the real thing.
///
/// The topology is anchored at the buffer's address: 8 small blocks followed
/// by two large sections, 128 KiB in total.
pub struct TestRam {
    bytes: Box<[u8]>,
}

impl TestRam {
    pub const SIZE: usize = 0x1_0000 + 2 * 32768;

    /// RAM filled with a recognisable garbage pattern.
    pub fn new() -> Self {
        Self {
            bytes: (0..Self::SIZE)
                .map(|i| (i as u8).wrapping_mul(31) ^ 0xA5)
                .collect(),
        }
    }

    pub fn topology(&self) -> RamTopology {
        RamTopology::new(
            self.bytes.as_ptr().addr(),
            Self::SIZE,
            NRF52_SMALL_SECTIONS,
            NRF52_SMALL_BLOCK_COUNT,
            NRF52_LARGE_SECTIONS,
        )
        .unwrap()
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// The address range of `offset..offset + len` within this RAM.
    pub fn range(&self, offset: usize, len: usize) -> MemoryRange {
        MemoryRange::new(self.bytes.as_ptr().addr() + offset, len)
    }
}
