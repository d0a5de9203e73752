//! User Virtual Address Types
//!
//! Type-safe wrappers for addresses that arrive from user space.
//!
//! # Security Properties
//! - A `UserAddr` is only a number; nothing here dereferences it
//! - Arithmetic is checked so a range can never wrap around the address space
//! - Whether an address is user-owned is decided against an explicit split

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;
/// Page size mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: usize = 12;

/// A virtual address supplied by a user program.
///
/// Untrusted until the pointer validator has probed it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct UserAddr(usize);

impl UserAddr {
    /// Wrap a raw user address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Get the page offset (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Get the virtual page number.
    #[inline]
    pub const fn page_number(self) -> usize {
        self.0 >> PAGE_SHIFT
    }

    /// Add an offset, failing instead of wrapping.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Check if this address lies below the user/kernel split.
    #[inline]
    pub const fn is_user(self, phys_base: usize) -> bool {
        self.0 < phys_base
    }
}

impl fmt::Debug for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserAddr({:#010x})", self.0)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A half-open byte range `[start, start + len)` in user space.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UserRange {
    start: UserAddr,
    len: usize,
}

impl UserRange {
    /// Build a range, or `None` if its end would overflow.
    pub const fn new(start: UserAddr, len: usize) -> Option<Self> {
        match start.checked_add(len) {
            Some(_) => Some(Self { start, len }),
            None => None,
        }
    }

    /// One past the last byte.
    #[inline]
    pub const fn end(&self) -> usize {
        self.start.0 + self.len
    }

    /// Check that every byte of the range lies below `phys_base`.
    #[inline]
    pub const fn is_user(&self, phys_base: usize) -> bool {
        self.end() <= phys_base
    }

    /// One address inside every page the range touches: the first byte,
    /// then the start of each following page.
    pub fn probe_points(&self) -> ProbePoints {
        ProbePoints {
            next: self.start.0,
            end: self.end(),
        }
    }
}

/// Iterator returned by [`UserRange::probe_points`].
#[derive(Debug, Clone)]
pub struct ProbePoints {
    next: usize,
    end: usize,
}

impl Iterator for ProbePoints {
    type Item = UserAddr;

    fn next(&mut self) -> Option<UserAddr> {
        if self.next >= self.end {
            return None;
        }
        let addr = self.next;
        self.next = (addr & !PAGE_MASK).saturating_add(PAGE_SIZE);
        Some(UserAddr(addr))
    }
}
