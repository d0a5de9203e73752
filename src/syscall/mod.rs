//! System Call Interface
//!
//! Entry point for system calls issued by user programs.
//!
//! # Security Model
//! - Whitelist approach: only calls in the table are dispatched
//! - All parameters are validated before use
//! - Invalid pointers terminate the caller, never the kernel
//! - Other invalid inputs return errors, never panic
//!
//! # Calls
//! | No. | Call                     | Result                    |
//! |-----|--------------------------|---------------------------|
//! | 0   | halt()                   | does not return           |
//! | 1   | exit(status)             | does not return           |
//! | 2   | exec(cmdline)            | child pid or -1           |
//! | 3   | wait(pid)                | exit status or -1         |
//! | 4   | create(name, size)       | 1 or 0                    |
//! | 5   | remove(name)             | 1 or 0                    |
//! | 6   | open(name)               | descriptor or -1          |
//! | 7   | filesize(fd)             | size or -1                |
//! | 8   | read(fd, buf, size)      | bytes read or -1          |
//! | 9   | write(fd, buf, size)     | bytes written or -1       |
//! | 10  | seek(fd, pos)            | 0 or -1                   |
//! | 11  | tell(fd)                 | position or -1            |
//! | 12  | close(fd)                | 0 or -1                   |

mod decode;
mod file;
mod handler;
mod process;
mod table;
mod validate;

pub use decode::{decode, Args, Decoded, WORD_SIZE};
pub use handler::{dispatch, SyscallError, SyscallResult};
pub use table::{lookup, ArgKind, Returns, Sysno, SyscallDescriptor, MAX_ARGS, SYSCALL_TABLE};
pub use validate::{UserAccess, UserBuffer, UserBufferMut};
