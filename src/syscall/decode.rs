//! System Call Argument Decoding
//!
//! Reads the call number and its argument words from the user stack. The
//! stack layout is one 32-bit slot per word:
//!
//! ```text
//! sp + 0   call number
//! sp + 4   argument 0
//! sp + 8   argument 1
//! sp + 12  argument 2
//! ```
//!
//! Every slot is validated before it is read, and no slot beyond the
//! descriptor's arity is ever touched.

use alloc::vec::Vec;

use super::handler::SyscallError;
use super::table::{self, ArgKind, SyscallDescriptor, MAX_ARGS};
use super::validate::{UserAccess, UserBuffer, UserBufferMut};

/// Width of one stack slot.
pub const WORD_SIZE: usize = 4;

/// Result of decoding the user stack.
#[derive(Debug)]
pub enum Decoded {
    /// A known call with its argument words.
    Call(Args),
    /// A call number with no table entry. Nothing past it was read.
    Unknown(u32),
}

/// Raw argument words of one call, tagged by its descriptor.
#[derive(Debug)]
pub struct Args {
    desc: &'static SyscallDescriptor,
    words: [u32; MAX_ARGS],
}

/// Decode the call at user stack pointer `sp`.
///
/// Fails with [`SyscallError::BadAddress`] if the call number or any declared
/// argument slot is not readable.
pub fn decode(user: &UserAccess<'_>, sp: usize) -> Result<Decoded, SyscallError> {
    let number = user.read_word(sp)?;
    let Some(desc) = table::lookup(number) else {
        return Ok(Decoded::Unknown(number));
    };

    let mut words = [0u32; MAX_ARGS];
    for (index, word) in words.iter_mut().take(desc.arity()).enumerate() {
        let slot = (index + 1)
            .checked_mul(WORD_SIZE)
            .and_then(|offset| sp.checked_add(offset))
            .ok_or(SyscallError::BadAddress)?;
        *word = user.read_word(slot)?;
    }
    Ok(Decoded::Call(Args { desc, words }))
}

impl Args {
    /// Descriptor of the decoded call.
    #[inline]
    pub fn descriptor(&self) -> &'static SyscallDescriptor {
        self.desc
    }

    fn word(&self, index: usize, expected: ArgKind) -> u32 {
        debug_assert_eq!(
            self.desc.args.get(index),
            Some(&expected),
            "{} argument {}",
            self.desc.name,
            index
        );
        self.words[index]
    }

    /// Signed integer argument.
    #[inline]
    pub fn int(&self, index: usize) -> i32 {
        self.word(index, ArgKind::Value) as i32
    }

    /// Unsigned integer argument.
    #[inline]
    pub fn uint(&self, index: usize) -> u32 {
        self.word(index, ArgKind::Value)
    }

    /// Copy a string argument into kernel memory, validating each byte.
    pub fn string(
        &self,
        index: usize,
        user: &UserAccess<'_>,
        max: usize,
    ) -> Result<Vec<u8>, SyscallError> {
        let ptr = self.word(index, ArgKind::Str) as usize;
        user.user_str(ptr, max)
    }

    /// Byte count paired with the buffer at `index`.
    #[inline]
    pub fn buffer_len(&self, index: usize) -> usize {
        self.word(index + 1, ArgKind::Len) as usize
    }

    /// Validate the input buffer at `index` (and its length at `index + 1`).
    pub fn buffer_in<'a>(
        &self,
        index: usize,
        user: &UserAccess<'a>,
    ) -> Result<UserBuffer<'a>, SyscallError> {
        let ptr = self.word(index, ArgKind::BufIn) as usize;
        user.validate_user_read(ptr, self.buffer_len(index))
    }

    /// Validate the output buffer at `index` (and its length at `index + 1`).
    pub fn buffer_out<'a>(
        &self,
        index: usize,
        user: &UserAccess<'a>,
    ) -> Result<UserBufferMut<'a>, SyscallError> {
        let ptr = self.word(index, ArgKind::BufOut) as usize;
        user.validate_user_write(ptr, self.buffer_len(index))
    }
}
