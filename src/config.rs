//! Layout constants and tunable limits for the trap layer.

use crate::mm::PAGE_SIZE;

/// First kernel virtual address. User memory lies strictly below it.
pub const PHYS_BASE: usize = 0xC000_0000;

/// Longest string (command line or file name) copied in from user space,
/// excluding the terminator.
pub const USER_STRING_MAX: usize = PAGE_SIZE;

/// Size of the kernel bounce buffer used by READ and WRITE.
pub const IO_CHUNK: usize = 512;

/// Largest single console write. Longer writes are split so output from
/// different processes does not interleave mid-line as often.
pub const CONSOLE_CHUNK: usize = 256;

/// Number of descriptor slots per process, console slots included.
pub const FD_TABLE_SIZE: usize = 128;

/// Per-machine configuration of the trap layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// User/kernel address-space split.
    pub phys_base: usize,
    /// See [`USER_STRING_MAX`].
    pub string_max: usize,
    /// See [`IO_CHUNK`].
    pub io_chunk: usize,
    /// See [`CONSOLE_CHUNK`].
    pub console_chunk: usize,
}

impl Config {
    /// Configuration with the compile-time defaults.
    pub const fn new() -> Self {
        Self {
            phys_base: PHYS_BASE,
            string_max: USER_STRING_MAX,
            io_chunk: IO_CHUNK,
            console_chunk: CONSOLE_CHUNK,
        }
    }

    /// Change the longest accepted user string.
    pub const fn with_string_max(mut self, string_max: usize) -> Self {
        self.string_max = string_max;
        self
    }

    /// Change the bounce buffer size. Zero is bumped to one byte.
    pub const fn with_io_chunk(mut self, io_chunk: usize) -> Self {
        self.io_chunk = if io_chunk == 0 { 1 } else { io_chunk };
        self
    }

    /// Change the console flush size. Zero is bumped to one byte.
    pub const fn with_console_chunk(mut self, console_chunk: usize) -> Self {
        self.console_chunk = if console_chunk == 0 { 1 } else { console_chunk };
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
