//! The capability contract between generated code and its host.
//!
//! A compiled program calls back into the host for every `,` and `.`
//! through two raw function pointers, each paired with an opaque context
//! argument - the five-argument System V signature in [`EntryFn`]. Rust
//! embedders implement [`HostIo`] instead; monomorphized `extern "C"`
//! trampolines adapt a `&mut impl HostIo` to the raw capability pair.
//! [`StdIo`] binds the capabilities to the process's character streams.

use std::ffi::c_void;
use std::os::raw::c_int;

/// Write capability: deliver one byte. Returns 1 on success; any other
/// value stops the running program at the current `.`.
pub type WriteFn = unsafe extern "C" fn(ctx: *mut c_void, byte: u8) -> i64;

/// Read capability: the next input byte as 0-255, or a negative value once
/// input is exhausted, which stops the running program at the current `,`.
/// A zero byte on the input stream is ordinary data.
pub type ReadFn = unsafe extern "C" fn(ctx: *mut c_void) -> i64;

/// Entry point of a compiled program: write capability, write context, read
/// capability, read context, tape base - in System V argument order.
pub type EntryFn =
    unsafe extern "C" fn(WriteFn, *mut c_void, ReadFn, *mut c_void, *mut u8);

/// Byte-level I/O the generated code calls out to.
///
/// `write_byte` returns `false` on failure and `read_byte` returns `None`
/// on end of input; either stops the running program at that instruction.
/// Implementations must not panic - the call arrives over an `extern "C"`
/// boundary, where unwinding aborts the process.
pub trait HostIo {
    fn write_byte(&mut self, byte: u8) -> bool;
    fn read_byte(&mut self) -> Option<u8>;
}

pub(crate) unsafe extern "C" fn write_shim<H: HostIo>(ctx: *mut c_void, byte: u8) -> i64 {
    let host = unsafe { &mut *ctx.cast::<H>() };
    i64::from(host.write_byte(byte))
}

pub(crate) unsafe extern "C" fn read_shim<H: HostIo>(ctx: *mut c_void) -> i64 {
    let host = unsafe { &mut *ctx.cast::<H>() };
    match host.read_byte() {
        Some(byte) => i64::from(byte),
        None => -1,
    }
}

/// Default capabilities: the process's standard character streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdIo;

impl HostIo for StdIo {
    fn write_byte(&mut self, byte: u8) -> bool {
        unsafe { libc::putchar(c_int::from(byte)) != libc::EOF }
    }

    fn read_byte(&mut self) -> Option<u8> {
        match unsafe { libc::getchar() } {
            libc::EOF => None,
            byte => Some(byte as u8),
        }
    }
}
