//! System Call Pointer Validation
//!
//! Every user-supplied pointer passes through here before the kernel touches
//! the memory behind it. This module is the only code that reads or writes
//! user bytes.
//!
//! # Security Principles
//! - Validate the whole range, for the access mode actually needed
//! - Fail-secure: null, overflowing, kernel-half and inaccessible ranges are
//!   all rejected the same way
//! - Probe instead of trusting page tables, so mapped-but-inaccessible pages
//!   are caught too
//! - Copy to kernel space before use (TOCTOU)

use alloc::vec::Vec;

use log::warn;

use super::handler::SyscallError;
use crate::mm::{Access, UserAddr, UserMemory, UserRange};

/// The current process's address space, seen through the validator.
#[derive(Clone, Copy)]
pub struct UserAccess<'a> {
    mem: &'a dyn UserMemory,
    phys_base: usize,
}

impl<'a> UserAccess<'a> {
    /// Validator over `mem`, with user space ending at `phys_base`.
    pub fn new(mem: &'a dyn UserMemory, phys_base: usize) -> Self {
        Self { mem, phys_base }
    }

    /// Check that `[addr, addr + len)` is accessible for `access`.
    ///
    /// Returns `false` for null, overflowing and kernel-half ranges without
    /// probing. Otherwise probes one byte in every page the range touches;
    /// write probes store back the byte they read, so a successful check
    /// leaves memory unchanged.
    pub fn is_valid(&self, addr: usize, len: usize, access: Access) -> bool {
        let start = UserAddr::new(addr);
        if start.is_null() || !start.is_user(self.phys_base) {
            return false;
        }
        let Some(range) = UserRange::new(start, len) else {
            return false;
        };
        if !range.is_user(self.phys_base) {
            return false;
        }
        range.probe_points().all(|point| self.probe(point, access))
    }

    fn probe(&self, addr: UserAddr, access: Access) -> bool {
        let Some(byte) = self.mem.get_user(addr) else {
            return false;
        };
        !access.contains(Access::WRITE) || self.mem.put_user(addr, byte)
    }

    /// Validate and read one byte.
    fn fetch(&self, addr: usize) -> Option<u8> {
        let addr = UserAddr::new(addr);
        if addr.is_null() || !addr.is_user(self.phys_base) {
            return None;
        }
        self.mem.get_user(addr)
    }

    /// Read a little-endian 32-bit word after validating all four bytes.
    pub fn read_word(&self, addr: usize) -> Result<u32, SyscallError> {
        if !self.is_valid(addr, 4, Access::READ) {
            warn!("[SYSCALL] rejected word read at {:#x}", addr);
            return Err(SyscallError::BadAddress);
        }
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.fetch(addr + i).ok_or(SyscallError::BadAddress)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    /// Copy a NUL-terminated string into kernel memory.
    ///
    /// Each byte is validated as the scan reaches it, terminator included.
    /// The returned bytes exclude the terminator. More than `max` bytes
    /// without a terminator fails with [`SyscallError::NameTooLong`].
    pub fn user_str(&self, addr: usize, max: usize) -> Result<Vec<u8>, SyscallError> {
        let mut bytes = Vec::new();
        let mut cursor = addr;
        loop {
            let Some(byte) = self.fetch(cursor) else {
                warn!(
                    "[SYSCALL] rejected string at {:#x} (bad byte at {:#x})",
                    addr, cursor
                );
                return Err(SyscallError::BadAddress);
            };
            if byte == 0 {
                return Ok(bytes);
            }
            if bytes.len() == max {
                return Err(SyscallError::NameTooLong);
            }
            bytes.push(byte);
            cursor = cursor.checked_add(1).ok_or(SyscallError::BadAddress)?;
        }
    }

    /// Validate a user buffer the kernel will read from.
    pub fn validate_user_read(&self, ptr: usize, len: usize) -> Result<UserBuffer<'a>, SyscallError> {
        // Zero-length buffers are never probed.
        if len != 0 && !self.is_valid(ptr, len, Access::READ) {
            warn!("[SYSCALL] rejected read buffer {:#x}+{}", ptr, len);
            return Err(SyscallError::BadAddress);
        }
        Ok(UserBuffer {
            mem: self.mem,
            ptr,
            len,
        })
    }

    /// Validate a user buffer the kernel will write into.
    pub fn validate_user_write(
        &self,
        ptr: usize,
        len: usize,
    ) -> Result<UserBufferMut<'a>, SyscallError> {
        if len != 0 && !self.is_valid(ptr, len, Access::WRITE) {
            warn!("[SYSCALL] rejected write buffer {:#x}+{}", ptr, len);
            return Err(SyscallError::BadAddress);
        }
        Ok(UserBufferMut {
            mem: self.mem,
            ptr,
            len,
        })
    }
}

/// Check that `offset..offset + n` lies inside a buffer of `len` bytes.
fn window(len: usize, offset: usize, n: usize) -> Result<(), SyscallError> {
    match offset.checked_add(n) {
        Some(end) if end <= len => Ok(()),
        _ => Err(SyscallError::BadAddress),
    }
}

/// A validated user-space buffer the kernel reads from.
///
/// This type guarantees that the whole range was accessible for reading at
/// validation time. Bytes are still fetched through the fault-recoverable
/// probe, so a page unmapped since then reports an error instead of faulting.
pub struct UserBuffer<'a> {
    mem: &'a dyn UserMemory,
    ptr: usize,
    len: usize,
}

impl UserBuffer<'_> {
    /// Buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for a zero-length buffer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `dst.len()` bytes starting at `offset` into kernel memory.
    pub fn copy_to_kernel(&self, offset: usize, dst: &mut [u8]) -> Result<(), SyscallError> {
        window(self.len, offset, dst.len())?;
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = self
                .mem
                .get_user(UserAddr::new(self.ptr + offset + i))
                .ok_or(SyscallError::BadAddress)?;
        }
        Ok(())
    }
}

/// A validated user-space buffer the kernel writes into.
pub struct UserBufferMut<'a> {
    mem: &'a dyn UserMemory,
    ptr: usize,
    len: usize,
}

impl UserBufferMut<'_> {
    /// Buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for a zero-length buffer.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `src` into the buffer starting at `offset`.
    pub fn copy_from_kernel(&self, offset: usize, src: &[u8]) -> Result<(), SyscallError> {
        window(self.len, offset, src.len())?;
        for (i, &byte) in src.iter().enumerate() {
            if !self.mem.put_user(UserAddr::new(self.ptr + offset + i), byte) {
                return Err(SyscallError::BadAddress);
            }
        }
        Ok(())
    }
}
