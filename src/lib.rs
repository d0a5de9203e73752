//! PantherOS User Program Trap Layer
//!
//! The boundary between user programs and the kernel: system call decoding,
//! user pointer validation, per-process file descriptors and the exit/wait
//! protocol between parents and children.
//!
//! # Security Features
//! - Every user pointer is validated by probing before the kernel uses it
//! - User strings and buffers are copied into kernel memory (no TOCTOU)
//! - A bad pointer terminates the offending process, never the kernel
//! - Unknown system call numbers are ignored
//!
//! # Architecture
//! - [`exception`]: trap frames and routing of synchronous exceptions
//! - [`syscall`]: call table, argument decoding, validation and handlers
//! - [`process`]: pids, descriptor tables and exit records
//! - [`mm`]: user addresses and fault-recoverable probes
//! - [`services`]: the scheduler, loader, file system and console this layer
//!   delegates to
//!
//! The crate is `no_std` with `alloc`. The kernel binary provides the heap,
//! the logger and the exception vectors.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod exception;
pub mod kernel;
pub mod mm;
pub mod process;
pub mod services;
pub mod syscall;

pub use config::Config;
pub use exception::{handle_kernel_exception, TrapFrame, TrapOutcome};
pub use kernel::{Kernel, KILLED_STATUS};
pub use process::{Pid, Process, ProcessTable};
pub use services::Services;
pub use syscall::SyscallError;
