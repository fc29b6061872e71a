#![no_std]
#![deny(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(missing_debug_implementations)]

//! This crate contains the definitions of the RAM power registers of the
//! nRF52 POWER peripheral, and [`Nrf52Power`], which drives them on behalf of
//! a [`ramret::RetentionController`].
//!
//! The register pointers may only be dereferenced on an nRF52, use elsewhere
//! is a very quick way to get UB. The bitfields and [`retention_bits`] are
//! plain values and fine to use anywhere.
//!
//! Every `RAM[n]` block has three registers. `POWER` holds the current state,
//! a write to `POWERSET` sets every bit written as 1 and a write to
//! `POWERCLR` clears every bit written as 1. Other bits are left alone, so
//! no read-modify-write is needed.

use bilge::prelude::*;
use ramret::{RetentionHardware, SectionBitmask};

/// Base address of the POWER peripheral.
pub const POWER_BASE: usize = 0x4000_0000;

/// Offset of `RAM[0].POWER` from [`POWER_BASE`].
pub const RAM_POWER_OFFSET: usize = 0x900;

/// Distance between the register groups of consecutive blocks.
pub const RAM_BLOCK_STRIDE: usize = 0x10;

/// Number of `RAM[n]` register groups.
pub const RAM_BLOCK_COUNT: usize = 16;

/// Sections one `RAM[n]` register can describe.
pub const SECTIONS_PER_REGISTER: usize = 16;

/// The `RAM[n].POWER` register layout, also used for `POWERSET` and
/// `POWERCLR`. Bit `s` of each half refers to section `s` of the block.
#[bitsize(32)]
#[derive(FromBits, Clone, Copy, PartialEq, Eq, DebugBits, DefaultBits)]
pub struct RamPower {
    /// Section is powered while the system is on.
    pub power: u16,
    /// Section keeps its content in System OFF.
    pub retention: u16,
}

impl RamPower {
    /// The register value after a write of `change` to `POWERSET` (`enable`)
    /// or `POWERCLR`.
    pub fn apply(self, change: RamPower, enable: bool) -> RamPower {
        let current = u32::from(self);
        let change = u32::from(change);

        RamPower::from(if enable {
            current | change
        } else {
            current & !change
        })
    }
}

/// The `POWERSET`/`POWERCLR` value touching exactly the retention bits of
/// the sections in `bits`.
///
/// Sections past the 16th cannot be expressed in the register and are
/// dropped. No nRF52 topology produces them.
pub fn retention_bits(bits: SectionBitmask) -> RamPower {
    RamPower::new(0, (bits.mask & 0xFFFF) as u16)
}

const fn ram_register(block: usize, offset: usize) -> *mut RamPower {
    assert!(block < RAM_BLOCK_COUNT, "RAM block must be in range 0..=15");

    (POWER_BASE + RAM_POWER_OFFSET + block * RAM_BLOCK_STRIDE + offset) as *mut _
}

/// `RAM[block].POWER`.
pub const fn ram_power(block: usize) -> *mut RamPower {
    ram_register(block, 0x0)
}

/// `RAM[block].POWERSET`.
pub const fn ram_powerset(block: usize) -> *mut RamPower {
    ram_register(block, 0x4)
}

/// `RAM[block].POWERCLR`.
pub const fn ram_powerclr(block: usize) -> *mut RamPower {
    ram_register(block, 0x8)
}

/// [`RetentionHardware`] for the POWER peripheral of the chip this runs on.
#[derive(Debug)]
pub struct Nrf52Power {
    _private: (),
}

impl Nrf52Power {
    /// # Safety
    ///
    /// Must only be used on an nRF52, and nothing else may write the RAM
    /// power registers while the value exists.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RetentionHardware for Nrf52Power {
    fn set_block_retention(&mut self, bits: SectionBitmask, enable: bool) {
        let register = if enable {
            ram_powerset(bits.block_index)
        } else {
            ram_powerclr(bits.block_index)
        };

        // Safety: we are on an nRF52 with exclusive access to the RAM power
        // registers, guaranteed by `Nrf52Power::new`.
        unsafe { register.write_volatile(retention_bits(bits)) };
    }
}
