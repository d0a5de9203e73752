//! Process Table
//!
//! Parent/child relationships and exit records. A record lives from the
//! moment a pid is allocated until whichever comes first: the parent waits
//! on it, or neither the parent nor the child is alive to need it.
//!
//! Blocking goes through the [`Scheduler`]. Every state change a blocked
//! thread might care about is followed by `wake_all`, and waiters recheck
//! their condition under the table lock.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use spin::Mutex;

use super::Pid;
use crate::services::Scheduler;

/// Load progress of a newly spawned process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadState {
    /// The loader has not reported yet.
    Pending,
    /// The executable loaded and the process is running.
    Loaded,
    /// The executable could not be loaded.
    Failed,
}

/// Bookkeeping for one process, kept after it exits so its parent can
/// collect the status.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExitRecord {
    pub parent: Option<Pid>,
    pub load: LoadState,
    pub status: Option<i32>,
    /// Resources are released and the status is final.
    pub exited: bool,
    /// The parent has started waiting.
    pub waited: bool,
}

impl ExitRecord {
    fn new(parent: Option<Pid>, load: LoadState) -> Self {
        Self {
            parent,
            load,
            status: None,
            exited: false,
            waited: false,
        }
    }
}

/// Exit records for every process.
pub struct ProcessTable {
    records: Mutex<BTreeMap<Pid, ExitRecord>>,
    next_pid: AtomicU32,
    scheduler: Arc<dyn Scheduler>,
}

impl ProcessTable {
    /// Create an empty table.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            next_pid: AtomicU32::new(1),
            scheduler,
        }
    }

    fn alloc_pid(&self) -> Pid {
        let raw = self.next_pid.fetch_add(1, Ordering::Relaxed);
        Pid(raw)
    }

    /// Register a process with no parent, such as the first user program.
    pub fn register_initial(&self) -> Pid {
        let pid = self.alloc_pid();
        self.records
            .lock()
            .insert(pid, ExitRecord::new(None, LoadState::Loaded));
        pid
    }

    /// Allocate a pid for a child of `parent`, pending its load.
    pub fn allocate(&self, parent: Pid) -> Pid {
        let pid = self.alloc_pid();
        self.records
            .lock()
            .insert(pid, ExitRecord::new(Some(parent), LoadState::Pending));
        trace!("[PROC] allocated pid {} for parent {}", pid, parent);
        pid
    }

    /// Report whether the executable of `pid` loaded.
    ///
    /// Called by the loader once per spawned process. Wakes the parent
    /// blocked in exec.
    pub fn finish_load(&self, pid: Pid, loaded: bool) {
        if let Some(record) = self.records.lock().get_mut(&pid) {
            record.load = if loaded {
                LoadState::Loaded
            } else {
                LoadState::Failed
            };
        }
        self.scheduler.wake_all();
    }

    /// Block until the load of `pid` is reported.
    ///
    /// A failed load discards the record, since nobody can wait on a pid
    /// that was never handed out.
    pub(crate) fn wait_for_load(&self, pid: Pid) -> bool {
        self.scheduler.block_until(&mut || {
            self.records
                .lock()
                .get(&pid)
                .map_or(true, |record| record.load != LoadState::Pending)
        });

        let mut records = self.records.lock();
        match records.get(&pid).map(|record| record.load) {
            Some(LoadState::Loaded) => true,
            Some(_) => {
                records.remove(&pid);
                false
            }
            None => false,
        }
    }

    /// Discard the record of a pid whose process never started.
    pub(crate) fn abandon(&self, pid: Pid) {
        self.records.lock().remove(&pid);
    }

    /// Record the exit status of `pid`.
    ///
    /// The first status recorded wins. Returns the status in effect.
    pub(crate) fn record_exit(&self, pid: Pid, status: i32) -> i32 {
        match self.records.lock().get_mut(&pid) {
            Some(record) => *record.status.get_or_insert(status),
            None => status,
        }
    }

    /// Finish the exit of `pid` once its resources are released.
    ///
    /// Children of `pid` become orphans, and records no live process can
    /// wait on are discarded. Wakes a parent blocked in wait.
    pub(crate) fn reap(&self, pid: Pid) {
        {
            let mut records = self.records.lock();
            records.retain(|_, record| {
                if record.parent != Some(pid) {
                    return true;
                }
                record.parent = None;
                !record.exited
            });
            if let Some(record) = records.get_mut(&pid) {
                record.exited = true;
                if record.parent.is_none() {
                    records.remove(&pid);
                }
            }
        }
        self.scheduler.wake_all();
    }

    /// Wait for `child` of `parent` to exit and collect its status.
    ///
    /// Returns None if `child` is not a direct child of `parent`, never
    /// loaded, or has already been waited on.
    pub fn wait(&self, parent: Pid, child: Pid) -> Option<i32> {
        {
            let mut records = self.records.lock();
            let record = records.get_mut(&child)?;
            if record.parent != Some(parent) || record.waited || record.load != LoadState::Loaded {
                return None;
            }
            record.waited = true;
        }

        self.scheduler.block_until(&mut || {
            self.records
                .lock()
                .get(&child)
                .map_or(true, |record| record.exited)
        });

        let status = self.records.lock().remove(&child)?.status;
        debug!("[PROC] {} collected {} with status {:?}", parent, child, status);
        status
    }

    /// Snapshot of the record for `pid`.
    pub fn record(&self, pid: Pid) -> Option<ExitRecord> {
        self.records.lock().get(&pid).copied()
    }

    /// Check whether a record exists for `pid`.
    pub fn contains(&self, pid: Pid) -> bool {
        self.records.lock().contains_key(&pid)
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
