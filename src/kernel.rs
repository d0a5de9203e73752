//! The Trap Layer Instance
//!
//! [`Kernel`] ties the configuration, the process table and the external
//! services together, and owns the two paths out of a process: normal exit
//! and forced termination.

use alloc::sync::Arc;

use log::{debug, info, warn};

use crate::config::Config;
use crate::exception::{TrapFrame, TrapOutcome};
use crate::process::{Pid, Process, ProcessTable};
use crate::services::Services;
use crate::syscall::{self, SyscallError};

/// Status recorded for a process terminated by the kernel.
pub const KILLED_STATUS: i32 = -1;

/// System call and user fault handling for one machine.
pub struct Kernel {
    config: Config,
    table: Arc<ProcessTable>,
    services: Services,
}

impl Kernel {
    /// Create the trap layer.
    ///
    /// `table` is shared with the loader, which reports load results to it.
    pub fn new(config: Config, table: Arc<ProcessTable>, services: Services) -> Self {
        info!(
            "[KERNEL] trap layer up (user space below {:#x})",
            config.phys_base
        );
        Self {
            config,
            table,
            services,
        }
    }

    /// Active configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Exit records for every process.
    #[inline]
    pub fn process_table(&self) -> &Arc<ProcessTable> {
        &self.table
    }

    #[inline]
    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    /// Handle a system call trapped from `current`.
    pub fn handle_syscall(&self, current: &Process, frame: &mut TrapFrame) -> TrapOutcome {
        syscall::dispatch(self, current, frame)
    }

    /// Handle a page fault or other exception raised by `current` in user
    /// mode. The process is terminated with status -1.
    pub fn handle_user_fault(&self, current: &Process, addr: usize) -> TrapOutcome {
        if !current.is_running() {
            return TrapOutcome::Exited;
        }
        warn!("[KERNEL] pid {}: user fault at {:#x}", current.pid(), addr);
        self.kill(current)
    }

    /// Power the machine down.
    pub(crate) fn halt(&self) -> TrapOutcome {
        info!("[KERNEL] halt requested");
        self.services.machine.power_off();
        TrapOutcome::PowerOff
    }

    /// Terminate `current` with a status it chose.
    pub(crate) fn exit(&self, current: &Process, status: i32) -> TrapOutcome {
        self.terminate(current, status);
        TrapOutcome::Exited
    }

    /// Terminate `current` for misbehaving.
    pub(crate) fn kill(&self, current: &Process) -> TrapOutcome {
        self.terminate(current, KILLED_STATUS);
        TrapOutcome::Exited
    }

    fn terminate(&self, current: &Process, status: i32) {
        if !current.begin_exit() {
            return;
        }
        let pid = current.pid();
        let status = self.table.record_exit(pid, status);

        let closed = current.files().lock().close_all();
        self.services.processes.release(pid);
        debug!("[KERNEL] pid {}: closed {} files", pid, closed);

        info!("{}: exit({})", current.name(), status);
        current.finish_exit();
        self.table.reap(pid);
    }

    /// Start a child of `parent` and wait for its load to finish.
    pub(crate) fn spawn(
        &self,
        parent: &Process,
        executable: &str,
        cmdline: &str,
    ) -> Result<Pid, SyscallError> {
        let pid = self.table.allocate(parent.pid());
        if let Err(err) = self.services.processes.spawn(pid, executable, cmdline) {
            debug!("[KERNEL] spawn of {:?} failed: {}", executable, err);
            self.table.abandon(pid);
            return Err(SyscallError::LoadFailed);
        }
        if self.table.wait_for_load(pid) {
            Ok(pid)
        } else {
            debug!("[KERNEL] {:?} failed to load", executable);
            Err(SyscallError::LoadFailed)
        }
    }
}
