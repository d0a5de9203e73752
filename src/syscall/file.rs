//! File system calls.
//!
//! Descriptors 0 and 1 are the console. Everything else goes through the
//! caller's descriptor table to a [`File`](crate::services::File).
//!
//! User buffers are validated in full before any byte moves, then copied
//! through a kernel bounce buffer. A transfer never exceeds the requested
//! size, and the count returned is the count actually moved.

use alloc::string::String;
use alloc::vec;

use super::decode::Args;
use super::handler::{Caller, SyscallError, SyscallResult};
use super::validate::{UserBuffer, UserBufferMut};
use crate::process::{Fd, FileHandle};

/// Largest count a call can report in the return register.
const MAX_TRANSFER: usize = i32::MAX as usize;

/// Sizes and positions past `i32::MAX` report as `i32::MAX`, never as a
/// negative value that reads like failure.
fn clamp_to_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn file_name(caller: &Caller<'_>, args: &Args, index: usize) -> Result<String, SyscallError> {
    let bytes = args.string(index, &caller.user, caller.config().string_max)?;
    String::from_utf8(bytes).map_err(|_| SyscallError::InvalidName)
}

fn fd_arg(args: &Args, index: usize) -> Result<Fd, SyscallError> {
    Fd::new(args.int(index)).ok_or(SyscallError::BadFd)
}

/// Look up an open file, holding the table lock only for the lookup.
fn open_file(caller: &Caller<'_>, args: &Args, index: usize) -> Result<FileHandle, SyscallError> {
    let fd = fd_arg(args, index)?;
    Ok(caller.process.files().lock().get(fd)?)
}

/// create(name, initial_size)
pub(super) fn sys_create(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let name = file_name(caller, args, 0)?;
    let created = caller.services().fs.create(&name, args.uint(1));
    Ok(i32::from(created))
}

/// remove(name)
pub(super) fn sys_remove(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let name = file_name(caller, args, 0)?;
    Ok(i32::from(caller.services().fs.remove(&name)))
}

/// open(name): returns the lowest free descriptor.
pub(super) fn sys_open(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let name = file_name(caller, args, 0)?;
    let file = caller
        .services()
        .fs
        .open(&name)
        .ok_or(SyscallError::NoSuchFile)?;
    let fd = caller.process.files().lock().insert(file)?;
    Ok(fd.as_raw())
}

/// filesize(fd)
pub(super) fn sys_filesize(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let file = open_file(caller, args, 0)?;
    let size = file.lock().size();
    Ok(clamp_to_int(size))
}

/// read(fd, buffer, size)
pub(super) fn sys_read(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let len = args.buffer_len(1);
    if len == 0 {
        return Ok(0);
    }
    let buf = args.buffer_out(1, &caller.user)?;
    let len = len.min(MAX_TRANSFER);

    if args.int(0) == Fd::STDIN.as_raw() {
        return read_console(caller, &buf, len);
    }
    let file = open_file(caller, args, 0)?;
    let mut file = file.lock();

    let mut bounce = vec![0u8; caller.config().io_chunk.min(len)];
    let mut done = 0;
    while done < len {
        let want = bounce.len().min(len - done);
        let got = file.read(&mut bounce[..want]).min(want);
        buf.copy_from_kernel(done, &bounce[..got])?;
        done += got;
        if got < want {
            break;
        }
    }
    Ok(done as i32)
}

fn read_console(caller: &Caller<'_>, buf: &UserBufferMut<'_>, len: usize) -> SyscallResult {
    let console = &caller.services().console;
    let mut bounce = vec![0u8; caller.config().io_chunk.min(len)];
    let mut done = 0;
    while done < len {
        let n = (len - done).min(bounce.len());
        let chunk = &mut bounce[..n];
        for byte in chunk.iter_mut() {
            *byte = console.getc();
        }
        buf.copy_from_kernel(done, chunk)?;
        done += chunk.len();
    }
    Ok(done as i32)
}

/// write(fd, buffer, size)
pub(super) fn sys_write(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let len = args.buffer_len(1);
    if len == 0 {
        return Ok(0);
    }
    let buf = args.buffer_in(1, &caller.user)?;
    let len = len.min(MAX_TRANSFER);

    if args.int(0) == Fd::STDOUT.as_raw() {
        return write_console(caller, &buf, len);
    }
    let file = open_file(caller, args, 0)?;
    let mut file = file.lock();

    let mut bounce = vec![0u8; caller.config().io_chunk.min(len)];
    let mut done = 0;
    while done < len {
        let n = (len - done).min(bounce.len());
        let chunk = &mut bounce[..n];
        buf.copy_to_kernel(done, chunk)?;
        let put = file.write(chunk).min(chunk.len());
        done += put;
        if put < chunk.len() {
            break;
        }
    }
    Ok(done as i32)
}

fn write_console(caller: &Caller<'_>, buf: &UserBuffer<'_>, len: usize) -> SyscallResult {
    let console = &caller.services().console;
    let mut bounce = vec![0u8; caller.config().console_chunk.min(len)];
    let mut done = 0;
    while done < len {
        let n = (len - done).min(bounce.len());
        let chunk = &mut bounce[..n];
        buf.copy_to_kernel(done, chunk)?;
        console.putbuf(chunk);
        done += chunk.len();
    }
    Ok(done as i32)
}

/// seek(fd, position)
pub(super) fn sys_seek(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let file = open_file(caller, args, 0)?;
    file.lock().seek(args.uint(1));
    Ok(0)
}

/// tell(fd)
pub(super) fn sys_tell(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let file = open_file(caller, args, 0)?;
    let pos = file.lock().tell();
    Ok(clamp_to_int(pos))
}

/// close(fd)
pub(super) fn sys_close(caller: &Caller<'_>, args: &Args) -> SyscallResult {
    let fd = fd_arg(args, 0)?;
    caller.process.files().lock().remove(fd)?;
    Ok(0)
}
