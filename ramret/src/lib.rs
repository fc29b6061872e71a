//! This crate keeps values alive across the System OFF state of nRF52
//! microcontrollers.
//!
//! In System OFF most of the RAM loses power. Sections can be configured to
//! retain their content, but that configuration is itself lost on the way
//! down, and after a cold boot the same memory holds garbage. This crate
//! deals with both sides of that:
//!
//! - [`RamTopology`] and [`RetentionController`] translate the byte range of a
//!   value into the per-block section masks the POWER peripheral expects, and
//!   set or clear them through a [`RetentionHardware`] implementation.
//! - [`integrity`] and [`RetainedRecord`] protect each value with a trailing
//!   CRC-32, detect whether it survived, and reset it to zero if it did not.
//!
//! The crate never logs. Reporting failed validations is left to the caller.
//!
//! # Example
//!
//! ```ignore
//! use ramret::{InitLevel, InitPriority, NoInitArena, RamTopology, RetentionController};
//!
//! let mut controller = RetentionController::new(RamTopology::NRF52840, power);
//! let arena = NoInitArena::new(noinit_region);
//!
//! let boots = arena.allocate_uninitialized::<u32>()?;
//! if !boots.validate(&mut controller)? {
//!     // Zeroed. Flush now if zero should count as valid from here on.
//! }
//!
//! *boots.value_mut() += 1;
//! boots.flush(&mut controller)?;
//! ```
#![no_std]
#![warn(clippy::all)]
#![warn(missing_docs)]

#[cfg(test)]
pub(crate) mod test_hardware;

mod arena;
mod init;
pub mod integrity;
mod record;
mod retention;
mod topology;

pub use arena::NoInitArena;
pub use init::{InitHook, InitLevel, InitPriority, InitQueue, StartupHooks};
pub use record::{RecordLayout, RetainedFlag, RetainedRecord};
pub use retention::{RetentionController, RetentionHardware};
pub use topology::{
    MAX_SECTIONS_PER_BLOCK, MemoryRange, NRF52_LARGE_SECTIONS, NRF52_SMALL_BLOCK_COUNT,
    NRF52_SMALL_SECTIONS, RamTopology, Section, SectionBitmask, SectionGeometry, SectionMap,
    Sections,
};

/// Errors that can occur while configuring retention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The range is empty or not entirely within the controllable RAM.
    #[error("The memory range is empty or lies outside the controllable RAM")]
    InvalidRange,
    /// The RAM geometry is inconsistent.
    #[error("The RAM geometry is inconsistent")]
    InvalidTopology,
    /// There is no room left in the no-init arena.
    #[error("There is no room left in the no-init arena")]
    ArenaExhausted,
    /// The startup hook queue is full.
    #[error("The startup hook queue is full")]
    InitQueueFull,
    /// Startup hook priorities go from 0 to 99.
    #[error("Startup hook priorities go from 0 to 99")]
    InvalidPriority,
}
