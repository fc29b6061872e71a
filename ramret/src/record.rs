//! The `{value, checksum}` records that live in retained RAM.

use core::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

use crate::Error;
use crate::integrity::{self, CHECKSUM_SIZE};
use crate::retention::{RetentionController, RetentionHardware};
use crate::topology::MemoryRange;

/// A value followed by the checksum protecting it.
///
/// The checksum is kept as raw little-endian bytes so it directly follows
/// `value` in memory with no padding in between. The byte image checked by
/// [`integrity`] is therefore exactly `size_of::<T>() + 4` bytes long, and
/// any bit pattern is a valid `RetainedRecord<T>`, which is what makes it
/// sound to hand out records over memory that was never initialised by Rust.
///
/// Records are usually obtained from a
/// [`NoInitArena`](crate::NoInitArena) and validated once at startup:
///
/// ```ignore
/// let boots = arena.allocate_uninitialized::<u32>()?;
/// if !boots.validate(&mut controller)? {
///     // first boot, or the data did not survive
/// }
/// *boots.value_mut() += 1;
/// boots.flush(&mut controller)?;
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetainedRecord<T> {
    value: T,
    checksum: [u8; CHECKSUM_SIZE],
}

impl<T: Pod> RetainedRecord<T> {
    const CHECKSUM_OFFSET: usize = {
        assert!(offset_of!(Self, checksum) == size_of::<T>());
        size_of::<T>()
    };

    const IMAGE_SIZE: usize = Self::CHECKSUM_OFFSET + CHECKSUM_SIZE;

    /// A record with every byte zero. Like a freshly reset record, this
    /// does not pass validation until [`update`](Self::update) is called.
    pub fn zeroed() -> Self {
        Self {
            value: T::zeroed(),
            checksum: [0; CHECKSUM_SIZE],
        }
    }

    /// A record holding `value` with a matching checksum.
    pub fn new(value: T) -> Self {
        let mut record = Self {
            value,
            checksum: [0; CHECKSUM_SIZE],
        };
        record.update();
        record
    }

    /// Size, checksum offset and name of this record type.
    pub fn layout() -> RecordLayout {
        RecordLayout::of::<T>()
    }

    /// The protected value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Mutable access to the value. The checksum is stale after any change
    /// until [`update`](Self::update) or [`flush`](Self::flush) is called.
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Replaces the value. Like [`value_mut`](Self::value_mut), this leaves
    /// the checksum stale.
    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    /// The stored checksum, as last written by [`update`](Self::update).
    pub fn checksum(&self) -> u32 {
        u32::from_le_bytes(self.checksum)
    }

    /// The `value ++ checksum` byte image.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the record is repr(C) with no padding before the end of
        // `checksum`, and both fields are plain old data.
        unsafe {
            core::slice::from_raw_parts(core::ptr::from_ref(self).cast::<u8>(), Self::IMAGE_SIZE)
        }
    }

    /// Mutable `value ++ checksum` byte image.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as for `as_bytes`, and any byte pattern is a valid `T`.
        unsafe {
            core::slice::from_raw_parts_mut(
                core::ptr::from_mut(self).cast::<u8>(),
                Self::IMAGE_SIZE,
            )
        }
    }

    /// The addresses covered by the byte image.
    pub fn range(&self) -> MemoryRange {
        MemoryRange::of_bytes(self.as_bytes())
    }

    /// Whether the stored checksum matches the value.
    pub fn is_intact(&self) -> bool {
        integrity::is_intact(self.as_bytes(), Self::CHECKSUM_OFFSET)
    }

    /// Validates the record, zeroing it if the checksum does not match, and
    /// arms retention for it. See [`integrity::validate`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] if the record is not in the controller's RAM.
    pub fn validate<H: RetentionHardware>(
        &mut self,
        controller: &mut RetentionController<H>,
    ) -> Result<bool, Error> {
        integrity::validate(self.as_bytes_mut(), Self::CHECKSUM_OFFSET, controller)
    }

    /// Recomputes the checksum of the current value.
    pub fn update(&mut self) {
        integrity::update(self.as_bytes_mut(), Self::CHECKSUM_OFFSET);
    }

    /// Recomputes the checksum and re-arms retention. Call this after every
    /// change and before the next System OFF.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] if the record is not in the controller's RAM.
    pub fn flush<H: RetentionHardware>(
        &mut self,
        controller: &mut RetentionController<H>,
    ) -> Result<(), Error> {
        self.update();
        controller.enable(self.range())
    }
}

/// How a record type is laid out in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    /// Name of the value type.
    pub type_name: &'static str,
    /// Size of the byte image, checksum included.
    pub size: usize,
    /// Offset of the checksum field, equal to the size of the value.
    pub checksum_offset: usize,
}

impl RecordLayout {
    /// The layout of `RetainedRecord<T>`.
    pub fn of<T: Pod>() -> Self {
        Self {
            type_name: core::any::type_name::<T>(),
            size: RetainedRecord::<T>::IMAGE_SIZE,
            checksum_offset: RetainedRecord::<T>::CHECKSUM_OFFSET,
        }
    }
}

/// A retained boolean that remembers whether it was ever explicitly set.
///
/// A record that failed validation is all zero, which reads as
/// [`DEFAULT_FALSE`](Self::DEFAULT_FALSE). Values below 2 are defaults, so
/// "use the default" and "the user chose" can be told apart after a reset.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct RetainedFlag(u32);

impl RetainedFlag {
    /// Never configured, default value false.
    pub const DEFAULT_FALSE: Self = Self(0);
    /// Never configured, default value true.
    pub const DEFAULT_TRUE: Self = Self(1);
    /// Explicitly configured to false.
    pub const CONFIGURED_FALSE: Self = Self(3);
    /// Explicitly configured to true.
    pub const CONFIGURED_TRUE: Self = Self(4);

    const DEFAULT_LIMIT: u32 = 2;

    /// The flag as explicitly configured to `value`.
    pub const fn configured(value: bool) -> Self {
        if value {
            Self::CONFIGURED_TRUE
        } else {
            Self::CONFIGURED_FALSE
        }
    }

    /// Whether the flag still holds a default.
    pub const fn is_default(self) -> bool {
        self.0 < Self::DEFAULT_LIMIT
    }

    /// The boolean value. Unknown encodings count as false.
    pub const fn get(self) -> bool {
        matches!(self, Self::DEFAULT_TRUE | Self::CONFIGURED_TRUE)
    }
}
