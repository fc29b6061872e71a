//! Allocation of records in memory the startup code does not clear.
//!
//! The C runtime zeroes `.bss` and copies `.data` before `main`, which would
//! destroy anything kept in retained RAM. Records therefore have to live in a
//! region the startup sequence skips, usually a `.noinit` linker section:
//!
//! ```ignore
//! #[unsafe(link_section = ".noinit")]
//! static mut RETAINED: [u8; 256] = [0; 256];
//!
//! // SAFETY: RETAINED is only ever accessed through this arena.
//! let arena = unsafe {
//!     NoInitArena::from_raw_parts(core::ptr::addr_of_mut!(RETAINED).cast(), 256)
//! };
//! let boots = arena.allocate_uninitialized::<u32>()?;
//! ```
//!
//! Allocation is a bump pointer, so declaring records in the same order on
//! every boot places each one at the same address it had before System OFF.

use core::cell::Cell;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};

use bytemuck::Pod;
use critical_section::Mutex;

use crate::Error;
use crate::record::RetainedRecord;

/// A region of retained memory handing out records in declaration order.
pub struct NoInitArena<'a> {
    base: *mut u8,
    len: usize,
    next: Mutex<Cell<usize>>,
    _region: PhantomData<&'a mut [u8]>,
}

// SAFETY: the region is exclusively owned by the arena and every allocation
// hands out a disjoint part of it, with the cursor guarded by a critical
// section.
unsafe impl Send for NoInitArena<'_> {}
unsafe impl Sync for NoInitArena<'_> {}

impl<'a> NoInitArena<'a> {
    /// An arena over `region`. Its current content becomes the initial
    /// content of the records allocated from it.
    pub fn new(region: &'a mut [u8]) -> Self {
        // SAFETY: the region is valid and exclusively borrowed for 'a.
        unsafe { Self::from_raw_parts(region.as_mut_ptr(), region.len()) }
    }

    /// An arena over `len` bytes at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for reads and writes for `'a`, must
    /// not be accessed other than through this arena for that time, and must
    /// be readable as bytes (on hardware, any RAM is).
    pub const unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Self {
        Self {
            base,
            len,
            next: Mutex::new(Cell::new(0)),
            _region: PhantomData,
        }
    }

    /// Bytes not yet handed out, ignoring alignment.
    pub fn remaining(&self) -> usize {
        critical_section::with(|cs| self.len - self.next.borrow(cs).get())
    }

    /// Reserves the next suitably aligned `RetainedRecord<T>`.
    ///
    /// The record is not initialised in any way: it holds whatever the
    /// memory held, either the previous boot's data or garbage. Call
    /// [`RetainedRecord::validate`] before trusting it.
    ///
    /// # Errors
    ///
    /// [`Error::ArenaExhausted`] if the record does not fit in what is left.
    pub fn allocate_uninitialized<T: Pod>(&self) -> Result<&'a mut RetainedRecord<T>, Error> {
        let offset = critical_section::with(|cs| {
            let next = self.next.borrow(cs);

            let addr = self.base.addr().checked_add(next.get())?;
            let aligned = addr.checked_next_multiple_of(align_of::<RetainedRecord<T>>())?;
            let offset = aligned - self.base.addr();
            let end = offset.checked_add(size_of::<RetainedRecord<T>>())?;

            if end > self.len {
                return None;
            }

            next.set(end);
            Some(offset)
        })
        .ok_or(Error::ArenaExhausted)?;

        // SAFETY: `offset..offset + size_of` lies inside the region, is
        // aligned for the record, and is never handed out again. Every byte
        // pattern is a valid record.
        Ok(unsafe { &mut *self.base.add(offset).cast::<RetainedRecord<T>>() })
    }
}

impl core::fmt::Debug for NoInitArena<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NoInitArena")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("remaining", &self.remaining())
            .finish()
    }
}
