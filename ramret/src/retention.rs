//! Applying retention settings to byte ranges.

use crate::Error;
use crate::topology::{MemoryRange, RamTopology, SectionBitmask};

/// Access to the register interface that controls RAM retention.
///
/// Implementations only have to set or clear the retention bits of one
/// block; splitting ranges into blocks is done by [`RetentionController`].
pub trait RetentionHardware {
    /// Sets (`enable`) or clears the retention bits of every section in
    /// `bits.mask` for block `bits.block_index`, leaving other sections of
    /// the block as they are.
    fn set_block_retention(&mut self, bits: SectionBitmask, enable: bool);
}

impl<H: RetentionHardware + ?Sized> RetentionHardware for &mut H {
    fn set_block_retention(&mut self, bits: SectionBitmask, enable: bool) {
        (**self).set_block_retention(bits, enable);
    }
}

/// Turns retention on and off for arbitrary ranges of RAM.
#[derive(Debug)]
pub struct RetentionController<H> {
    topology: RamTopology,
    hardware: H,
}

impl<H: RetentionHardware> RetentionController<H> {
    /// Creates a controller for `topology` driving `hardware`.
    pub const fn new(topology: RamTopology, hardware: H) -> Self {
        Self { topology, hardware }
    }

    /// The RAM geometry this controller maps ranges with.
    pub const fn topology(&self) -> &RamTopology {
        &self.topology
    }

    /// The underlying hardware.
    pub const fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Mutable access to the underlying hardware.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Gives back the underlying hardware.
    pub fn into_hardware(self) -> H {
        self.hardware
    }

    /// Sets or clears retention for every section overlapping `range`, with
    /// one hardware call per block.
    ///
    /// Sections are the unit of retention, so neighbouring data sharing a
    /// section with `range` is affected too.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] if `range` is empty or not fully within RAM.
    /// No hardware calls are made in that case.
    pub fn set_retention(&mut self, range: MemoryRange, enabled: bool) -> Result<(), Error> {
        for bits in self.topology.map_range(range)? {
            self.hardware.set_block_retention(bits, enabled);
        }

        Ok(())
    }

    /// Enables retention for `range`. See [`set_retention`](Self::set_retention).
    pub fn enable(&mut self, range: MemoryRange) -> Result<(), Error> {
        self.set_retention(range, true)
    }

    /// Disables retention for `range`. See [`set_retention`](Self::set_retention).
    pub fn disable(&mut self, range: MemoryRange) -> Result<(), Error> {
        self.set_retention(range, false)
    }
}
