//! System Call Dispatch
//!
//! Decodes the call on the user stack, routes it to its handler and stores
//! the result in the trap frame.
//!
//! # Security Considerations
//! - Call numbers are looked up in a fixed table; unknown numbers are ignored
//! - Every argument word is validated before it is read
//! - An invalid pointer anywhere terminates the caller with status -1
//! - Every other failure is reported through the return register

use core::fmt;

use log::{debug, trace, warn};

use super::decode::{decode, Args, Decoded};
use super::table::Sysno;
use super::validate::UserAccess;
use super::{file, process};
use crate::config::Config;
use crate::exception::{TrapFrame, TrapOutcome};
use crate::kernel::Kernel;
use crate::process::{FdError, Process};
use crate::services::Services;

/// System call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// A user pointer was null, in the kernel half, or inaccessible.
    BadAddress,
    /// The descriptor is not open, or not usable for this call.
    BadFd,
    /// A user string had no terminator within the length limit.
    NameTooLong,
    /// A name was not valid UTF-8.
    InvalidName,
    /// The file system has no such file.
    NoSuchFile,
    /// The descriptor table is full.
    TableFull,
    /// The executable could not be started.
    LoadFailed,
    /// The pid is not an unwaited direct child of the caller.
    NotWaitable,
}

impl SyscallError {
    /// Check whether the error terminates the calling process.
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::BadAddress)
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAddress => write!(f, "bad user address"),
            Self::BadFd => write!(f, "bad file descriptor"),
            Self::NameTooLong => write!(f, "name too long"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::NoSuchFile => write!(f, "no such file"),
            Self::TableFull => write!(f, "descriptor table full"),
            Self::LoadFailed => write!(f, "load failed"),
            Self::NotWaitable => write!(f, "not a waitable child"),
        }
    }
}

impl From<FdError> for SyscallError {
    fn from(err: FdError) -> Self {
        match err {
            FdError::Reserved | FdError::SlotEmpty => Self::BadFd,
            FdError::TableFull => Self::TableFull,
        }
    }
}

/// Result of a system call handler: the value for the return register.
pub type SyscallResult = Result<i32, SyscallError>;

/// The calling process and everything a handler reaches through it.
pub(super) struct Caller<'a> {
    pub kernel: &'a Kernel,
    pub process: &'a Process,
    pub user: UserAccess<'a>,
}

impl Caller<'_> {
    #[inline]
    pub fn config(&self) -> &Config {
        self.kernel.config()
    }

    #[inline]
    pub fn services(&self) -> &Services {
        self.kernel.services()
    }
}

/// Handle the system call trapped in `frame`.
///
/// On return the frame's return register holds the result, unless the call
/// number was unknown, the call does not return, or the caller was
/// terminated.
pub fn dispatch(kernel: &Kernel, current: &Process, frame: &mut TrapFrame) -> TrapOutcome {
    if !current.is_running() {
        return TrapOutcome::Exited;
    }

    let user = UserAccess::new(current.memory(), kernel.config().phys_base);
    let args = match decode(&user, frame.user_sp()) {
        Ok(Decoded::Call(args)) => args,
        Ok(Decoded::Unknown(number)) => {
            debug!("[SYSCALL] pid {}: unknown syscall {}", current.pid(), number);
            return TrapOutcome::Resume;
        }
        Err(err) => {
            warn!("[SYSCALL] pid {}: bad stack {:#x}: {}", current.pid(), frame.user_sp(), err);
            return kernel.kill(current);
        }
    };

    let desc = args.descriptor();
    trace!("[SYSCALL] pid {}: {}", current.pid(), desc.name);

    let caller = Caller {
        kernel,
        process: current,
        user,
    };
    let result = match desc.sysno {
        Sysno::Halt => return kernel.halt(),
        Sysno::Exit => return kernel.exit(current, args.int(0)),
        Sysno::Exec => process::sys_exec(&caller, &args),
        Sysno::Wait => process::sys_wait(&caller, &args),
        Sysno::Create => file::sys_create(&caller, &args),
        Sysno::Remove => file::sys_remove(&caller, &args),
        Sysno::Open => file::sys_open(&caller, &args),
        Sysno::Filesize => file::sys_filesize(&caller, &args),
        Sysno::Read => file::sys_read(&caller, &args),
        Sysno::Write => file::sys_write(&caller, &args),
        Sysno::Seek => file::sys_seek(&caller, &args),
        Sysno::Tell => file::sys_tell(&caller, &args),
        Sysno::Close => file::sys_close(&caller, &args),
    };

    complete(kernel, current, frame, &args, result)
}

fn complete(
    kernel: &Kernel,
    current: &Process,
    frame: &mut TrapFrame,
    args: &Args,
    result: SyscallResult,
) -> TrapOutcome {
    let desc = args.descriptor();
    match result {
        Ok(value) => {
            frame.set_return_value(value);
            TrapOutcome::Resume
        }
        Err(err) if err.is_fatal() => {
            warn!("[SYSCALL] pid {}: {}: {}", current.pid(), desc.name, err);
            kernel.kill(current)
        }
        Err(err) => {
            debug!("[SYSCALL] pid {}: {}: {}", current.pid(), desc.name, err);
            frame.set_return_value(desc.failure_value());
            TrapOutcome::Resume
        }
    }
}
