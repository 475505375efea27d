//! The executable-memory lifecycle.
//!
//! A finished code buffer is copied into a page-aligned anonymous mapping
//! which is then sealed execute+read-only. The transition is one-way and
//! happens exactly once per build, so a page is never writable and
//! executable at the same time (W^X). Mapping acquisition and the
//! protection transition fail separately, each with the underlying OS
//! error.

use std::io;
use std::ptr;

use log::debug;

use crate::error::{CompileError, CompileResult};
use crate::host::EntryFn;

/// A frozen region of executable code, released on drop.
#[derive(Debug)]
pub struct ExecutableRegion {
    ptr: *mut libc::c_void,
    len: usize,
}

impl ExecutableRegion {
    /// Map a fresh region sized to a whole number of pages, copy `code` in,
    /// and seal it execute+read-only.
    pub fn new(code: &[u8]) -> CompileResult<Self> {
        let page = usize::try_from(unsafe { libc::sysconf(libc::_SC_PAGESIZE) }).unwrap_or(4096);
        let len = code.len().div_ceil(page) * page;

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(CompileError::Map {
                len,
                source: io::Error::last_os_error(),
            });
        }

        unsafe {
            ptr::copy_nonoverlapping(code.as_ptr(), ptr.cast::<u8>(), code.len());
        }

        if unsafe { libc::mprotect(ptr, len, libc::PROT_READ | libc::PROT_EXEC) } != 0 {
            let source = io::Error::last_os_error();
            unsafe { libc::munmap(ptr, len) };
            return Err(CompileError::Protect { source });
        }

        debug!("sealed {len} byte executable region at {ptr:p}");
        Ok(Self { ptr, len })
    }

    /// Size of the mapping in bytes; a whole number of pages.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The region base as a callable entry point.
    pub(crate) fn entry_point(&self) -> EntryFn {
        unsafe { std::mem::transmute::<*mut libc::c_void, EntryFn>(self.ptr) }
    }
}

impl Drop for ExecutableRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}
