//! Kernel Services Used by the Trap Layer
//!
//! The trap layer owns argument decoding, pointer validation, descriptor
//! tables and exit bookkeeping. Everything else it delegates through these
//! traits: loading programs, blocking threads, the file system, the console
//! and the machine itself.

use alloc::boxed::Box;
use core::fmt;

use crate::process::Pid;

/// Thread blocking, provided by the scheduler.
pub trait Scheduler: Send + Sync {
    /// Suspend the calling thread until `ready` returns `true`.
    ///
    /// `ready` is evaluated before suspending and again after every
    /// [`Scheduler::wake_all`]. Implementations must not lose a wakeup that
    /// races with the first evaluation.
    fn block_until(&self, ready: &mut dyn FnMut() -> bool);

    /// Wake every thread blocked in [`Scheduler::block_until`].
    fn wake_all(&self);
}

/// Error starting a new process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No memory for the thread or address space.
    OutOfMemory,
    /// The process limit has been reached.
    TooManyProcesses,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::TooManyProcesses => write!(f, "too many processes"),
        }
    }
}

/// Process creation and teardown, provided by the loader.
pub trait ProcessManager: Send + Sync {
    /// Start process `pid` running `executable` with command line `cmdline`.
    ///
    /// Returns once a thread for the new process exists. Whether the
    /// executable actually loaded is reported later through
    /// [`ProcessTable::finish_load`](crate::process::table::ProcessTable::finish_load).
    fn spawn(&self, pid: Pid, executable: &str, cmdline: &str) -> Result<(), SpawnError>;

    /// Release the address space of a terminated process.
    fn release(&self, pid: Pid);
}

/// The file system.
///
/// Implementations synchronise internally; the trap layer calls them from
/// any process thread.
pub trait FileSystem: Send + Sync {
    /// Create `name` with `initial_size` zero bytes.
    fn create(&self, name: &str, initial_size: u32) -> bool;

    /// Remove `name`. Open handles stay usable.
    fn remove(&self, name: &str) -> bool;

    /// Open `name`.
    fn open(&self, name: &str) -> Option<Box<dyn File>>;
}

/// An open file. Dropping the handle closes it.
pub trait File: Send {
    /// Read at the current position, returning the bytes read.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write at the current position, returning the bytes written.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Move the position. Positions past the end are allowed.
    fn seek(&mut self, pos: u32);

    /// Current position.
    fn tell(&self) -> u32;

    /// File size in bytes.
    fn size(&self) -> u32;
}

/// The system console.
pub trait Console: Send + Sync {
    /// Block for one byte of keyboard input.
    fn getc(&self) -> u8;

    /// Write bytes to the display.
    fn putbuf(&self, buf: &[u8]);
}

/// Machine-level control.
pub trait Machine: Send + Sync {
    /// Power the machine down.
    fn power_off(&self);
}

/// Everything the trap layer delegates to.
pub struct Services {
    pub processes: Box<dyn ProcessManager>,
    pub fs: Box<dyn FileSystem>,
    pub console: Box<dyn Console>,
    pub machine: Box<dyn Machine>,
}
