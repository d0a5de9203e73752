//! User Processes as Seen by the Trap Layer
//!
//! A [`Process`] bundles what a system call needs from its caller: the pid,
//! the user address space, the descriptor table and the run state.
//!
//! # Lifecycle
//! ```text
//! Running ──exit / bad pointer / fault──▶ Exiting ──▶ Terminated
//! ```
//! `Terminated` is absorbing: traps from a terminated process are ignored.

pub mod fd;
pub mod table;

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use spin::Mutex;

use crate::mm::UserMemory;
use fd::FdTable;

pub use fd::{Fd, FdError, FileHandle};
pub use table::{ExitRecord, LoadState, ProcessTable};

/// A process identifier. Always positive.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// Convert a raw user-supplied pid.
    ///
    /// Returns None for zero and negative values.
    #[inline]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        if raw > 0 {
            Some(Self(raw as u32))
        } else {
            None
        }
    }

    /// The pid as returned to user space.
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run state of a process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunState {
    Running,
    Exiting,
    Terminated,
}

/// A user process.
pub struct Process {
    pid: Pid,
    name: String,
    memory: Box<dyn UserMemory>,
    files: Mutex<FdTable>,
    state: Mutex<RunState>,
}

impl Process {
    /// Create a running process over the address space `memory`.
    pub fn new(pid: Pid, name: impl Into<String>, memory: Box<dyn UserMemory>) -> Self {
        Self {
            pid,
            name: name.into(),
            memory,
            files: Mutex::new(FdTable::new()),
            state: Mutex::new(RunState::Running),
        }
    }

    /// Process id.
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Executable name, as used in the exit line.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The process's user address space.
    #[inline]
    pub fn memory(&self) -> &dyn UserMemory {
        &*self.memory
    }

    /// The descriptor table, behind the per-process lock.
    #[inline]
    pub fn files(&self) -> &Mutex<FdTable> {
        &self.files
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Check whether the process may still issue system calls.
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Move from `Running` to `Exiting`.
    ///
    /// Returns false if the process was already on its way out, so the
    /// termination path runs at most once.
    pub(crate) fn begin_exit(&self) -> bool {
        let mut state = self.state.lock();
        if *state != RunState::Running {
            return false;
        }
        *state = RunState::Exiting;
        true
    }

    /// Move from `Exiting` to `Terminated`.
    pub(crate) fn finish_exit(&self) {
        *self.state.lock() = RunState::Terminated;
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
