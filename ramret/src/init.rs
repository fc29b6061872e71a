//! Ordered startup hooks.
//!
//! Records should be validated before the application starts using them.
//! On Zephyr that is done with `SYS_INIT`; here it is the [`StartupHooks`]
//! trait, so the platform's own boot sequencing can be plugged in. For hosted
//! use and tests, [`InitQueue`] keeps the hooks in a fixed-size list and runs
//! them once in order.

use crate::Error;

/// Boot phases, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InitLevel {
    /// Right after entering Rust, before any architecture setup.
    Early,
    /// Kernel initialisation, no kernel services yet.
    PreKernel1,
    /// Same as [`PreKernel1`](Self::PreKernel1), run after it.
    PreKernel2,
    /// The kernel is up and its primitives may be used.
    PostKernel,
    /// Just before the application entry point.
    Application,
}

/// Priority within an [`InitLevel`]. Lower runs earlier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InitPriority(u8);

impl InitPriority {
    /// Runs first within its level.
    pub const HIGHEST: Self = Self(0);
    /// Runs last within its level.
    pub const LOWEST: Self = Self(99);
    /// Where record validation hooks go unless configured otherwise.
    pub const RECORD_DEFAULT: Self = Self(30);

    /// A priority between [`HIGHEST`](Self::HIGHEST) and
    /// [`LOWEST`](Self::LOWEST).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPriority`] if `priority > 99`.
    pub const fn new(priority: u8) -> Result<Self, Error> {
        if priority > Self::LOWEST.0 {
            return Err(Error::InvalidPriority);
        }

        Ok(Self(priority))
    }

    /// The numeric priority.
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// A startup hook. `C` is whatever context the boot sequence hands to its
/// hooks, `()` if there is none.
pub type InitHook<C> = fn(&mut C);

/// Something that runs hooks once, in `(level, priority)` order, before the
/// application starts.
pub trait StartupHooks<C> {
    /// Schedules `hook` to run at `level` with `priority`.
    ///
    /// # Errors
    ///
    /// Implementation defined; [`InitQueue`] returns [`Error::InitQueueFull`].
    fn register(
        &mut self,
        level: InitLevel,
        priority: InitPriority,
        hook: InitHook<C>,
    ) -> Result<(), Error>;
}

struct InitEntry<C> {
    level: InitLevel,
    priority: InitPriority,
    hook: InitHook<C>,
}

impl<C> InitEntry<C> {
    fn key(&self) -> (InitLevel, InitPriority) {
        (self.level, self.priority)
    }
}

/// A fixed capacity [`StartupHooks`] implementation.
///
/// Hooks with the same level and priority run in registration order.
pub struct InitQueue<C, const N: usize> {
    entries: heapless::Vec<InitEntry<C>, N>,
}

impl<C, const N: usize> InitQueue<C, N> {
    /// An empty queue.
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every hook in order with `context`. Consumes the queue, so the
    /// hooks cannot run twice. Returns the number of hooks run.
    pub fn run(self, context: &mut C) -> usize {
        let count = self.entries.len();
        for entry in self.entries {
            (entry.hook)(context);
        }
        count
    }
}

impl<C, const N: usize> Default for InitQueue<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> StartupHooks<C> for InitQueue<C, N> {
    fn register(
        &mut self,
        level: InitLevel,
        priority: InitPriority,
        hook: InitHook<C>,
    ) -> Result<(), Error> {
        let entry = InitEntry {
            level,
            priority,
            hook,
        };

        let position = self
            .entries
            .iter()
            .position(|existing| existing.key() > entry.key())
            .unwrap_or(self.entries.len());

        self.entries
            .insert(position, entry)
            .map_err(|_| Error::InitQueueFull)
    }
}

impl<C, const N: usize> core::fmt::Debug for InitQueue<C, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(InitEntry::key))
            .finish()
    }
}
