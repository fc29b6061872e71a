//! RAM geometry and the mapping of byte ranges onto retention sections.
//!
//! The RAM of an nRF52 is made of independently power gated arrays. The
//! first part of the address space is covered by up to 8 "small" blocks of
//! two 4 KiB sections each. Everything after that belongs to a terminal block
//! with 32 KiB sections. Retention is configured per block with one bit per
//! section, so a byte range has to be translated into a list of
//! `(block, mask)` pairs before the hardware can be told about it.
//!
//! ```text
//! ram_begin                                large_section_begin          ram_end
//! |  blk 0  |  blk 1  |   ...   |  blk 7  |        block 8 (large)        |
//! | s0 | s1 | s0 | s1 |         | s0 | s1 |  s0  |  s1  |  s2  | ... | sN  |
//! ```

use core::iter::FusedIterator;

use crate::Error;

#[cfg(test)]
mod proptest;

/// The maximum number of sections a single block may have, one bit each in
/// [`SectionBitmask::mask`].
pub const MAX_SECTIONS_PER_BLOCK: usize = u32::BITS as usize;

/// Section layout shared by every block of one class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionGeometry {
    /// Size of one section in bytes.
    pub section_size: usize,
    /// How many sections a block of this class controls.
    pub sections_per_block: usize,
}

impl SectionGeometry {
    const fn block_size(&self) -> Option<usize> {
        self.section_size.checked_mul(self.sections_per_block)
    }

    const fn is_valid(&self) -> bool {
        self.section_size != 0
            && self.sections_per_block != 0
            && self.sections_per_block <= MAX_SECTIONS_PER_BLOCK
    }
}

/// Small sections on every nRF52 with the POWER peripheral.
pub const NRF52_SMALL_SECTIONS: SectionGeometry = SectionGeometry {
    section_size: 4096,
    sections_per_block: 2,
};

/// Sections of the terminal block. `RAM[x]` has room for 16 sections even
/// though no current part has more than 6; the true limit is the RAM size.
pub const NRF52_LARGE_SECTIONS: SectionGeometry = SectionGeometry {
    section_size: 32768,
    sections_per_block: 16,
};

/// Number of small blocks on the nRF52 series.
pub const NRF52_SMALL_BLOCK_COUNT: usize = 8;

/// Static description of the retention-controllable RAM.
///
/// A topology is only ever created through [`RamTopology::new`] (or the
/// nRF52 helpers), which guarantees that the terminal region starts exactly
/// where the small blocks end and that the large block is indexed directly
/// after the last small block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RamTopology {
    ram_begin: usize,
    ram_end: usize,
    small: SectionGeometry,
    small_block_count: usize,
    large: SectionGeometry,
    large_section_begin: usize,
    large_block_index: usize,
}

impl RamTopology {
    /// The 64 KiB RAM of an nRF52832.
    pub const NRF52832: RamTopology = RamTopology::nrf52(0x2000_0000, 64 * 1024);

    /// The 256 KiB RAM of an nRF52840.
    pub const NRF52840: RamTopology = RamTopology::nrf52(0x2000_0000, 256 * 1024);

    /// Describes `ram_size` bytes of RAM starting at `ram_begin`, split into
    /// `small_block_count` blocks of `small` sections followed by a terminal
    /// region of `large` sections.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTopology`] if the RAM is empty, a section geometry has
    /// zero sized sections or more sections per block than fit in a mask, or
    /// any of the derived addresses overflow.
    pub const fn new(
        ram_begin: usize,
        ram_size: usize,
        small: SectionGeometry,
        small_block_count: usize,
        large: SectionGeometry,
    ) -> Result<Self, Error> {
        if ram_size == 0 || !small.is_valid() || !large.is_valid() {
            return Err(Error::InvalidTopology);
        }

        let Some(ram_end) = ram_begin.checked_add(ram_size) else {
            return Err(Error::InvalidTopology);
        };
        let Some(small_block_size) = small.block_size() else {
            return Err(Error::InvalidTopology);
        };
        let Some(small_span) = small_block_size.checked_mul(small_block_count) else {
            return Err(Error::InvalidTopology);
        };
        let Some(large_section_begin) = ram_begin.checked_add(small_span) else {
            return Err(Error::InvalidTopology);
        };
        if large.block_size().is_none() {
            return Err(Error::InvalidTopology);
        }

        Ok(Self {
            ram_begin,
            ram_end,
            small,
            small_block_count,
            large,
            large_section_begin,
            large_block_index: small_block_count,
        })
    }

    /// An nRF52 RAM of `ram_size` bytes at `ram_begin`.
    ///
    /// # Panics
    ///
    /// Panics if `ram_begin + ram_size` overflows or `ram_size` is zero. In a
    /// const context that is a compile error.
    pub const fn nrf52(ram_begin: usize, ram_size: usize) -> Self {
        match Self::new(
            ram_begin,
            ram_size,
            NRF52_SMALL_SECTIONS,
            NRF52_SMALL_BLOCK_COUNT,
            NRF52_LARGE_SECTIONS,
        ) {
            Ok(topology) => topology,
            Err(_) => panic!("invalid nRF52 RAM geometry"),
        }
    }

    /// Inclusive address of the start of RAM.
    pub const fn ram_begin(&self) -> usize {
        self.ram_begin
    }

    /// Exclusive address of the end of RAM.
    pub const fn ram_end(&self) -> usize {
        self.ram_end
    }

    /// Size of the RAM in bytes.
    pub const fn ram_size(&self) -> usize {
        self.ram_end - self.ram_begin
    }

    /// Geometry of the uniform region.
    pub const fn small_sections(&self) -> SectionGeometry {
        self.small
    }

    /// Number of blocks in the uniform region.
    pub const fn small_block_count(&self) -> usize {
        self.small_block_count
    }

    /// Geometry of the terminal region.
    pub const fn large_sections(&self) -> SectionGeometry {
        self.large
    }

    /// First address covered by large sections. May be at or past
    /// [`ram_end`](Self::ram_end) on parts with no large sections.
    pub const fn large_section_begin(&self) -> usize {
        self.large_section_begin
    }

    /// Block index of the first block of large sections.
    pub const fn large_block_index(&self) -> usize {
        self.large_block_index
    }

    /// Number of blocks that contain at least one byte of RAM.
    pub fn block_count(&self) -> usize {
        match self.locate(self.ram_end - 1) {
            Some(last) => last.block + 1,
            None => 0,
        }
    }

    /// Whether `range` is non-empty and lies entirely within RAM.
    pub fn contains(&self, range: MemoryRange) -> bool {
        match range.end() {
            Some(end) => range.length != 0 && range.begin >= self.ram_begin && end <= self.ram_end,
            None => false,
        }
    }

    /// Finds the section containing `addr`, or `None` if it is not RAM.
    pub fn locate(&self, addr: usize) -> Option<Section> {
        (self.ram_begin..self.ram_end)
            .contains(&addr)
            .then(|| self.classify(addr))
    }

    /// Every controllable section in address order.
    pub fn sections(&self) -> Sections<'_> {
        Sections {
            topology: self,
            addr: self.ram_begin,
        }
    }

    /// Computes the `(block, mask)` pairs covering `range`, one per block,
    /// in block order.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] if the range is empty or not fully within RAM.
    /// The range is checked up front, so the returned iterator cannot fail.
    pub fn map_range(&self, range: MemoryRange) -> Result<SectionMap<'_>, Error> {
        if !self.contains(range) {
            return Err(Error::InvalidRange);
        }

        Ok(SectionMap {
            topology: self,
            addr: range.begin,
            end: range.begin + range.length,
        })
    }

    /// `addr` must be inside RAM.
    fn classify(&self, addr: usize) -> Section {
        let (mut block, block_base, geometry) = if addr >= self.large_section_begin {
            (self.large_block_index, self.large_section_begin, self.large)
        } else {
            (0, self.ram_begin, self.small)
        };

        let section_in_region = (addr - block_base) / geometry.section_size;
        let mut section = section_in_region;

        // Sections past the end of a block belong to the following blocks of
        // the same class.
        if section >= geometry.sections_per_block {
            block += section / geometry.sections_per_block;
            section %= geometry.sections_per_block;
        }

        let begin = block_base + section_in_region * geometry.section_size;
        let end = begin
            .saturating_add(geometry.section_size)
            .min(self.ram_end);

        Section {
            block,
            index: section,
            begin,
            end,
        }
    }
}

/// A contiguous range of RAM addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    /// First address of the range.
    pub begin: usize,
    /// Length in bytes.
    pub length: usize,
}

impl MemoryRange {
    /// A range of `length` bytes starting at `begin`.
    pub const fn new(begin: usize, length: usize) -> Self {
        Self { begin, length }
    }

    /// The bytes occupied by `value`.
    pub fn of<T>(value: &T) -> Self {
        Self::new(
            core::ptr::from_ref(value).addr(),
            core::mem::size_of::<T>(),
        )
    }

    /// The bytes covered by `bytes`.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::new(bytes.as_ptr().addr(), bytes.len())
    }

    /// Exclusive end address, or `None` if it overflows.
    pub const fn end(&self) -> Option<usize> {
        self.begin.checked_add(self.length)
    }
}

/// The hardware-facing unit of retention control: a set of sections within
/// one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SectionBitmask {
    /// Index of the block (`RAM[n]` on nRF52).
    pub block_index: usize,
    /// Bit `n` set means section `n` of the block.
    pub mask: u32,
}

impl SectionBitmask {
    /// Creates a mask for `block_index`.
    pub const fn new(block_index: usize, mask: u32) -> Self {
        Self { block_index, mask }
    }

    /// Whether section `index` of the block is included.
    pub const fn contains_section(&self, index: usize) -> bool {
        index < MAX_SECTIONS_PER_BLOCK && self.mask & (1 << index) != 0
    }

    /// Number of sections in the mask.
    pub const fn section_count(&self) -> u32 {
        self.mask.count_ones()
    }
}

/// One controllable section of RAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Section {
    /// Block the section belongs to.
    pub block: usize,
    /// Index of the section within its block.
    pub index: usize,
    /// First address of the section.
    pub begin: usize,
    /// Exclusive end address, clamped to the end of RAM.
    pub end: usize,
}

impl Section {
    /// The section as a single-bit mask.
    pub const fn bitmask(&self) -> SectionBitmask {
        SectionBitmask::new(self.block, 1 << self.index)
    }
}

/// Iterator over the `(block, mask)` pairs of a range. Returned by
/// [`RamTopology::map_range`].
#[derive(Clone, Debug)]
pub struct SectionMap<'a> {
    topology: &'a RamTopology,
    addr: usize,
    end: usize,
}

impl Iterator for SectionMap<'_> {
    type Item = SectionBitmask;

    fn next(&mut self) -> Option<Self::Item> {
        if self.addr >= self.end {
            return None;
        }

        let first = self.topology.classify(self.addr);
        let mut bits = first.bitmask();
        self.addr = first.end;

        while self.addr < self.end {
            let section = self.topology.classify(self.addr);
            if section.block != bits.block_index {
                break;
            }

            bits.mask |= 1 << section.index;
            self.addr = section.end;
        }

        Some(bits)
    }
}

impl FusedIterator for SectionMap<'_> {}

/// Iterator over every section of a topology. Returned by
/// [`RamTopology::sections`].
#[derive(Clone, Debug)]
pub struct Sections<'a> {
    topology: &'a RamTopology,
    addr: usize,
}

impl Iterator for Sections<'_> {
    type Item = Section;

    fn next(&mut self) -> Option<Self::Item> {
        let section = self.topology.locate(self.addr)?;
        self.addr = section.end;
        Some(section)
    }
}

impl FusedIterator for Sections<'_> {}
