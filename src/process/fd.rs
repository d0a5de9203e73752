//! File Descriptor Table
//!
//! Per-process table mapping small integers to open files.
//!
//! # Design
//! - Fixed-size array of slots, addressed by `Fd` indices
//! - Slots 0 and 1 belong to the console and never hold a file
//! - New files take the lowest free slot
//! - Operations: lookup, insert, remove, close all

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use spin::Mutex;

use crate::config::FD_TABLE_SIZE;
use crate::services::File;

/// An open file shared between the table and in-flight system calls.
///
/// The file closes when the last handle is dropped.
pub type FileHandle = Arc<Mutex<Box<dyn File>>>;

/// A descriptor index.
///
/// This is a newtype to prevent using arbitrary integers as slot indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct Fd(u32);

impl Fd {
    /// Console input.
    pub const STDIN: Self = Self(0);

    /// Console output.
    pub const STDOUT: Self = Self(1);

    /// First slot available to files.
    pub const FIRST_FILE: Self = Self(2);

    /// Convert a raw user-supplied descriptor.
    ///
    /// Returns None if the value is negative or out of range.
    #[inline]
    pub const fn new(raw: i32) -> Option<Self> {
        if raw >= 0 && (raw as usize) < FD_TABLE_SIZE {
            Some(Self(raw as u32))
        } else {
            None
        }
    }

    /// Get the index value.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The descriptor as returned to user space.
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0 as i32
    }

    /// Check for one of the console descriptors.
    #[inline]
    pub const fn is_console(self) -> bool {
        self.0 < Self::FIRST_FILE.0
    }
}

/// Error type for descriptor table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdError {
    /// The descriptor belongs to the console.
    Reserved,
    /// The slot is empty.
    SlotEmpty,
    /// Every slot is in use.
    TableFull,
}

impl fmt::Display for FdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserved => write!(f, "descriptor reserved for the console"),
            Self::SlotEmpty => write!(f, "descriptor not open"),
            Self::TableFull => write!(f, "descriptor table full"),
        }
    }
}

/// Descriptor table for a process.
pub struct FdTable {
    slots: [Option<FileHandle>; FD_TABLE_SIZE],
}

impl FdTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        const EMPTY: Option<FileHandle> = None;
        Self {
            slots: [EMPTY; FD_TABLE_SIZE],
        }
    }

    /// Look up an open file.
    pub fn get(&self, fd: Fd) -> Result<FileHandle, FdError> {
        if fd.is_console() {
            return Err(FdError::Reserved);
        }
        self.slots[fd.index()].clone().ok_or(FdError::SlotEmpty)
    }

    /// Install a file in the lowest free slot.
    ///
    /// On a full table the file is dropped, which closes it.
    pub fn insert(&mut self, file: Box<dyn File>) -> Result<Fd, FdError> {
        let fd = self.find_free().ok_or(FdError::TableFull)?;
        self.slots[fd.index()] = Some(Arc::new(Mutex::new(file)));
        Ok(fd)
    }

    /// Remove a file from its slot.
    ///
    /// The file closes once no in-flight call still holds it.
    pub fn remove(&mut self, fd: Fd) -> Result<FileHandle, FdError> {
        if fd.is_console() {
            return Err(FdError::Reserved);
        }
        self.slots[fd.index()].take().ok_or(FdError::SlotEmpty)
    }

    /// Close every open file, returning how many were open.
    pub fn close_all(&mut self) -> usize {
        self.slots
            .iter_mut()
            .filter_map(Option::take)
            .count()
    }

    /// Find the lowest free file slot.
    pub fn find_free(&self) -> Option<Fd> {
        (Fd::FIRST_FILE.index()..FD_TABLE_SIZE)
            .find(|&i| self.slots[i].is_none())
            .map(|i| Fd(i as u32))
    }

    /// Number of open files.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdTable")
            .field("open", &self.open_count())
            .finish()
    }
}
