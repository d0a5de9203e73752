//! ARM64 Exception Entry for User Programs
//!
//! Classifies synchronous exceptions and routes them into the trap layer.
//!
//! # Exception Levels
//! - EL0: User applications
//! - EL1: Kernel (where we run)
//!
//! # Exception Types
//! - SVC from EL0: system calls
//! - Data/instruction aborts from EL0: faults attributable to the process
//! - Data aborts at EL1: either a user-memory probe that faulted (recovered)
//!   or a genuine kernel bug
//!
//! # Security Considerations
//! - Nothing a user program does from EL0 can halt the kernel
//! - Register state is only touched through the return-value slot

use log::{error, warn};

use crate::kernel::Kernel;
use crate::mm;
use crate::process::Process;

/// Exception context saved on the kernel stack by the vector stubs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    /// General purpose registers x0-x30
    pub gpr: [u64; 31],
    /// User stack pointer at the time of the trap
    pub sp_el0: u64,
    /// Exception Link Register (return address)
    pub elr: u64,
    /// Saved Program Status Register
    pub spsr: u64,
    /// Exception Syndrome Register
    pub esr: u64,
    /// Fault Address Register
    pub far: u64,
}

impl TrapFrame {
    /// Register that receives the system call result.
    pub const RETURN_REG: usize = 0;

    /// Frame as captured for an `svc` issued with stack pointer `user_sp`.
    pub fn for_syscall(user_sp: usize) -> Self {
        Self {
            sp_el0: user_sp as u64,
            esr: (ExceptionClass::SvcAarch64 as u64) << 26,
            ..Self::default()
        }
    }

    /// Frame as captured for an EL0 data abort at `far`.
    pub fn for_user_abort(far: usize) -> Self {
        Self {
            far: far as u64,
            esr: (ExceptionClass::DataAbortLowerEl as u64) << 26,
            ..Self::default()
        }
    }

    /// User stack pointer at trap time.
    #[inline]
    pub fn user_sp(&self) -> usize {
        self.sp_el0 as usize
    }

    /// Store a system call result, sign-extended into the return register.
    #[inline]
    pub fn set_return_value(&mut self, value: i32) {
        self.gpr[Self::RETURN_REG] = i64::from(value) as u64;
    }

    /// Low 32 bits of the return register.
    #[inline]
    pub fn return_value(&self) -> i32 {
        self.gpr[Self::RETURN_REG] as i32
    }

    /// Exception class from ESR_EL1.
    #[inline]
    pub fn exception_class(&self) -> ExceptionClass {
        ExceptionClass::from(self.esr)
    }
}

/// Exception class extracted from ESR_EL1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionClass {
    Unknown = 0x00,
    SvcAarch64 = 0x15,
    InstructionAbortLowerEl = 0x20,
    InstructionAbortSameEl = 0x21,
    DataAbortLowerEl = 0x24,
    DataAbortSameEl = 0x25,
    Other = 0xFF,
}

impl From<u64> for ExceptionClass {
    fn from(esr: u64) -> Self {
        let ec = ((esr >> 26) & 0x3F) as u8;
        match ec {
            0x00 => ExceptionClass::Unknown,
            0x15 => ExceptionClass::SvcAarch64,
            0x20 => ExceptionClass::InstructionAbortLowerEl,
            0x21 => ExceptionClass::InstructionAbortSameEl,
            0x24 => ExceptionClass::DataAbortLowerEl,
            0x25 => ExceptionClass::DataAbortSameEl,
            _ => ExceptionClass::Other,
        }
    }
}

/// What the exception return path must do after the trap layer is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Restore the frame and return to the process.
    Resume,
    /// The process is terminated; schedule something else.
    Exited,
    /// The machine has been asked to power down.
    PowerOff,
}

impl Kernel {
    /// Handle a synchronous exception taken from EL0.
    ///
    /// SVCs become system calls. Every other exception class from user mode
    /// is a fault attributable to the process and terminates it.
    pub fn handle_exception(&self, current: &Process, frame: &mut TrapFrame) -> TrapOutcome {
        match frame.exception_class() {
            ExceptionClass::SvcAarch64 => self.handle_syscall(current, frame),
            ExceptionClass::DataAbortLowerEl | ExceptionClass::InstructionAbortLowerEl => {
                self.handle_user_fault(current, frame.far as usize)
            }
            ec => {
                warn!(
                    "[EXCEPTION] unhandled class {:?} from pid {} (ESR: {:#018x})",
                    ec,
                    current.pid(),
                    frame.esr
                );
                self.handle_user_fault(current, frame.far as usize)
            }
        }
    }
}

/// Handle a synchronous exception taken at EL1.
///
/// Returns `true` if the exception was a faulting user-memory probe and the
/// frame has been redirected to the probe's landing pad. `false` means a
/// genuine kernel fault; the caller is expected to panic.
pub fn handle_kernel_exception(frame: &mut TrapFrame) -> bool {
    if frame.exception_class() == ExceptionClass::DataAbortSameEl
        && mm::recover_probe_fault(frame)
    {
        return true;
    }
    error!("[EXCEPTION] kernel exception: {:?}", frame.exception_class());
    error!("[EXCEPTION] ELR: {:#018x} FAR: {:#018x}", frame.elr, frame.far);
    false
}
