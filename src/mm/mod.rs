//! Memory access for the trap layer
//!
//! Provides:
//! - Typed user addresses and ranges
//! - Fault-recoverable byte probes into user space
//!
//! # Security Principles
//! - User addresses are plain numbers until probed
//! - Probes never fault the kernel
//! - Paging itself belongs to the VM subsystem, not to this crate

pub mod address;
pub mod uaccess;

pub use address::{UserAddr, UserRange, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};
pub use uaccess::{recover_probe_fault, Access, UserMemory};

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use uaccess::ActiveSpace;
