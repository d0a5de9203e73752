//! Fault-Recoverable User Memory Access
//!
//! The kernel touches user memory one byte at a time through probes that
//! survive a fault. On AArch64 the probe registers a landing pad, performs an
//! unprivileged `ldtrb`/`sttrb`, and the same-EL data abort handler resumes at
//! the landing pad instead of treating the abort as a kernel bug.
//!
//! # Security Properties
//! - Unprivileged loads/stores check EL0 permissions, so kernel-only and
//!   mapped-but-inaccessible pages fail exactly like unmapped ones
//! - A fault inside the probe window never escalates into a kernel panic
//! - Only the pointer validator calls these probes

use core::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;

use super::address::UserAddr;
use crate::exception::TrapFrame;

bitflags! {
    /// Access a user range must permit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        /// The kernel will read the range.
        const READ = 1 << 0;
        /// The kernel will write the range.
        const WRITE = 1 << 1;
    }
}

/// Fault-recoverable byte access to the current process's address space.
///
/// Implementations must not fault the kernel for any address: an access that
/// would fault reports failure instead.
pub trait UserMemory: Send + Sync {
    /// Read the byte at `addr`. `None` if the load faulted.
    fn get_user(&self, addr: UserAddr) -> Option<u8>;

    /// Write `byte` to `addr`. `false` if the store faulted.
    fn put_user(&self, addr: UserAddr, byte: u8) -> bool;
}

/// Landing pad of the probe currently in flight, or zero.
///
/// PantherOS runs a single EL1 context, so one slot is enough.
static PROBE_LANDING: AtomicUsize = AtomicUsize::new(0);

/// Route a same-EL data abort back into the probe that caused it.
///
/// Returns `true` if a probe was in flight: the frame now resumes at the
/// probe's landing pad, which reports the access as failed. Returns `false`
/// if the abort happened outside any probe and is a genuine kernel fault.
pub fn recover_probe_fault(frame: &mut TrapFrame) -> bool {
    let landing = PROBE_LANDING.swap(0, Ordering::SeqCst);
    if landing == 0 {
        return false;
    }
    log::trace!(
        "[UACCESS] fault at {:#x} inside probe, resuming at {:#x}",
        frame.far,
        landing
    );
    frame.elr = landing as u64;
    true
}

/// The address space installed in TTBR0, accessed with unprivileged probes.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct ActiveSpace;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
impl UserMemory for ActiveSpace {
    fn get_user(&self, addr: UserAddr) -> Option<u8> {
        use core::arch::asm;

        let result: i64;
        // SAFETY:
        // - ldtrb performs the load with EL0 permissions
        // - A fault resumes at label 2 via recover_probe_fault, leaving -1
        // - The landing slot is cleared on both paths
        unsafe {
            asm!(
                "mov {res}, #-1",
                "adr {tmp}, 2f",
                "str {tmp}, [{landing}]",
                "ldtrb {byte:w}, [{addr}]",
                "mov {res}, {byte}",
                "2:",
                "str xzr, [{landing}]",
                res = out(reg) result,
                tmp = out(reg) _,
                byte = out(reg) _,
                addr = in(reg) addr.as_usize(),
                landing = in(reg) PROBE_LANDING.as_ptr(),
                options(nostack),
            );
        }
        if result < 0 {
            None
        } else {
            Some(result as u8)
        }
    }

    fn put_user(&self, addr: UserAddr, byte: u8) -> bool {
        use core::arch::asm;

        let ok: u64;
        // SAFETY:
        // - sttrb performs the store with EL0 permissions
        // - A fault resumes at label 2 via recover_probe_fault, leaving 0
        // - The landing slot is cleared on both paths
        unsafe {
            asm!(
                "mov {ok}, #0",
                "adr {tmp}, 2f",
                "str {tmp}, [{landing}]",
                "sttrb {byte:w}, [{addr}]",
                "mov {ok}, #1",
                "2:",
                "str xzr, [{landing}]",
                ok = out(reg) ok,
                tmp = out(reg) _,
                byte = in(reg) u32::from(byte),
                addr = in(reg) addr.as_usize(),
                landing = in(reg) PROBE_LANDING.as_ptr(),
                options(nostack),
            );
        }
        ok == 1
    }
}
