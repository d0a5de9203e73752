//! Process system calls: exec and wait.

use alloc::string::String;

use log::info;

use super::decode::Args;
use super::handler::{Caller, SyscallError, SyscallResult};
use crate::process::Pid;

/// The executable name: the first whitespace-separated word of `cmdline`.
fn executable_name(cmdline: &str) -> Option<&str> {
    cmdline.split_ascii_whitespace().next()
}

/// exec(cmdline): start a child running the named executable.
///
/// Returns the child's pid once it has loaded, or -1 if it could not be
/// started.
pub(super) fn sys_exec(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let bytes = args.string(0, &caller.user, caller.config().string_max)?;
    let cmdline = String::from_utf8(bytes).map_err(|_| SyscallError::InvalidName)?;
    let executable = executable_name(&cmdline).ok_or(SyscallError::LoadFailed)?;

    let pid = caller.kernel.spawn(caller.process, executable, &cmdline)?;
    info!("[SYSCALL] pid {}: exec {:?} -> {}", caller.process.pid(), executable, pid);
    Ok(pid.as_raw())
}

/// wait(pid): block until the child exits and return its status.
pub(super) fn sys_wait(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let child = Pid::from_raw(args.int(0)).ok_or(SyscallError::NotWaitable)?;
    caller
        .kernel
        .process_table()
        .wait(caller.process.pid(), child)
        .ok_or(SyscallError::NotWaitable)
}
