extern crate std;

use std::vec::Vec;

use quickcheck::{Arbitrary, Gen, quickcheck};

use crate::topology::{MemoryRange, RamTopology};

const BASE: usize = 0x2000_0000;

/// A range somewhere inside a 256 KiB nRF52840 RAM.
#[derive(Clone, Copy, Debug)]
struct RamRange(MemoryRange);

impl Arbitrary for RamRange {
    fn arbitrary(g: &mut Gen) -> Self {
        let ram_size = RamTopology::NRF52840.ram_size();

        // Bias towards short ranges near interesting boundaries, while still
        // covering arbitrary spans.
        let begin_offset = match u8::arbitrary(g) % 4 {
            0 => usize::arbitrary(g) % ram_size,
            1 => (0x1_0000 + usize::arbitrary(g) % 64).saturating_sub(32),
            2 => (usize::arbitrary(g) % 8) * 8192 + 8192 - 1 - usize::arbitrary(g) % 16,
            _ => 0x1_0000 + (usize::arbitrary(g) % 6) * 32768,
        };

        let max_length = ram_size - begin_offset;
        let length = 1 + usize::arbitrary(g) % max_length.min(if bool::arbitrary(g) {
            64
        } else {
            max_length
        });

        RamRange(MemoryRange::new(BASE + begin_offset, length))
    }
}

const SMALL_SECTION: usize = 4096;
const SMALL_BLOCK: usize = 2 * SMALL_SECTION;
const LARGE_SECTION: usize = 32768;
const LARGE_BEGIN: usize = BASE + 8 * SMALL_BLOCK;

/// Every `(block, section)` touched by `range` on an nRF52840, stepping from
/// one section boundary to the next with plain address arithmetic.
fn reference_sections(range: MemoryRange) -> Vec<(usize, usize)> {
    let end = range.begin + range.length;
    let mut sections = Vec::new();
    let mut addr = range.begin;

    while addr < end {
        let section_size = if addr < LARGE_BEGIN {
            let offset = addr - BASE;
            sections.push((offset / SMALL_BLOCK, offset % SMALL_BLOCK / SMALL_SECTION));
            SMALL_SECTION
        } else {
            sections.push((8, (addr - LARGE_BEGIN) / LARGE_SECTION));
            LARGE_SECTION
        };

        addr += section_size - (addr % section_size);
    }

    sections
}

quickcheck! {
    fn every_touched_section_is_mapped_exactly_once(range: RamRange) -> bool {
        let topology = RamTopology::NRF52840;
        let mapped: Vec<_> = topology.map_range(range.0).unwrap().collect();

        let mut flattened = Vec::new();
        for bits in &mapped {
            for index in 0..32 {
                if bits.contains_section(index) {
                    flattened.push((bits.block_index, index));
                }
            }
        }

        flattened == reference_sections(range.0)
    }

    fn blocks_are_emitted_once_in_order(range: RamRange) -> bool {
        let topology = RamTopology::NRF52840;
        let mapped: Vec<_> = topology.map_range(range.0).unwrap().collect();

        mapped.windows(2).all(|pair| pair[0].block_index < pair[1].block_index)
            && mapped.iter().all(|bits| bits.mask != 0)
    }

    fn first_and_last_byte_are_covered(range: RamRange) -> bool {
        let topology = RamTopology::NRF52840;
        let mapped: Vec<_> = topology.map_range(range.0).unwrap().collect();

        let first = topology.locate(range.0.begin).unwrap();
        let last = topology.locate(range.0.begin + range.0.length - 1).unwrap();

        let covers = |block: usize, index: usize| {
            mapped
                .iter()
                .any(|bits| bits.block_index == block && bits.contains_section(index))
        };

        covers(first.block, first.index) && covers(last.block, last.index)
    }

    fn ranges_leaving_ram_are_rejected(offset: usize, length: usize) -> bool {
        let topology = RamTopology::NRF52840;
        let begin = topology.ram_end() - (offset % 4096);
        let length = length % 8192;

        let range = MemoryRange::new(begin, length);
        let inside = length != 0 && begin + length <= topology.ram_end();

        topology.map_range(range).is_ok() == inside
    }
}
