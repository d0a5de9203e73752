//! System Call Table
//!
//! Static description of every system call: number, argument layout and
//! result kind. The decoder reads exactly the words a descriptor declares,
//! and the dispatcher uses the result kind to marshal failures.

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Sysno {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Create = 4,
    Remove = 5,
    Open = 6,
    Filesize = 7,
    Read = 8,
    Write = 9,
    Seek = 10,
    Tell = 11,
    Close = 12,
}

impl Sysno {
    /// Raw call number as seen on the user stack.
    #[inline]
    pub const fn number(self) -> u32 {
        self as u32
    }
}

/// How an argument word is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Plain integer.
    Value,
    /// Pointer to a NUL-terminated string.
    Str,
    /// Pointer to a buffer the kernel reads from. Followed by a `Len`.
    BufIn,
    /// Pointer to a buffer the kernel writes into. Followed by a `Len`.
    BufOut,
    /// Byte count of the preceding buffer.
    Len,
}

/// What a call leaves in the return register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    /// Never returns to the caller.
    Never,
    /// Integer result, -1 on failure.
    Int,
    /// 1 for true, 0 for false.
    Bool,
    /// No meaningful result: 0 on success, -1 on failure.
    Unit,
}

/// Static description of one system call.
#[derive(Debug, PartialEq, Eq)]
pub struct SyscallDescriptor {
    pub sysno: Sysno,
    pub name: &'static str,
    pub args: &'static [ArgKind],
    pub returns: Returns,
}

impl SyscallDescriptor {
    /// Number of argument words following the call number.
    #[inline]
    pub const fn arity(&self) -> usize {
        self.args.len()
    }

    /// Value stored in the return register when the call fails recoverably.
    pub const fn failure_value(&self) -> i32 {
        match self.returns {
            Returns::Bool => 0,
            Returns::Never | Returns::Int | Returns::Unit => -1,
        }
    }
}

/// Largest arity in the table.
pub const MAX_ARGS: usize = 3;

use ArgKind::{BufIn, BufOut, Len, Str, Value};

const fn desc(
    sysno: Sysno,
    name: &'static str,
    args: &'static [ArgKind],
    returns: Returns,
) -> SyscallDescriptor {
    SyscallDescriptor {
        sysno,
        name,
        args,
        returns,
    }
}

/// The system call table, indexed by call number.
pub static SYSCALL_TABLE: [SyscallDescriptor; 13] = [
    desc(Sysno::Halt, "halt", &[], Returns::Never),
    desc(Sysno::Exit, "exit", &[Value], Returns::Never),
    desc(Sysno::Exec, "exec", &[Str], Returns::Int),
    desc(Sysno::Wait, "wait", &[Value], Returns::Int),
    desc(Sysno::Create, "create", &[Str, Value], Returns::Bool),
    desc(Sysno::Remove, "remove", &[Str], Returns::Bool),
    desc(Sysno::Open, "open", &[Str], Returns::Int),
    desc(Sysno::Filesize, "filesize", &[Value], Returns::Int),
    desc(Sysno::Read, "read", &[Value, BufOut, Len], Returns::Int),
    desc(Sysno::Write, "write", &[Value, BufIn, Len], Returns::Int),
    desc(Sysno::Seek, "seek", &[Value, Value], Returns::Unit),
    desc(Sysno::Tell, "tell", &[Value], Returns::Int),
    desc(Sysno::Close, "close", &[Value], Returns::Unit),
];

/// Look up the descriptor for a raw call number.
#[inline]
pub fn lookup(number: u32) -> Option<&'static SyscallDescriptor> {
    SYSCALL_TABLE.get(number as usize)
}
