//! The compiled-program handle.
//!
//! [`CompiledProgram`] is an opaque value constructible only through the
//! fallible [`CompiledProgram::compile`]; it exposes no mutation, so a
//! program that exists is always complete, relocated, and sealed. One
//! program can be run any number of times against different tapes.

use std::ffi::c_void;

use log::debug;

use crate::builder::ProgramBuilder;
use crate::error::CompileResult;
use crate::exec::ExecutableRegion;
use crate::host::{read_shim, write_shim, HostIo, StdIo};

/// A Brainfuck program compiled to native x86-64 code.
#[derive(Debug)]
pub struct CompiledProgram {
    region: ExecutableRegion,
}

impl CompiledProgram {
    /// Compile `source` to native code. Characters outside the eight
    /// Brainfuck instructions are ignored.
    ///
    /// Fails on an unmatched `[` or when the executable mapping cannot be
    /// set up; no partially built program is ever returned.
    pub fn compile(source: &str) -> CompileResult<Self> {
        let code = ProgramBuilder::new(source.as_bytes()).build()?;
        debug!(
            "compiled {} source bytes into {} bytes of machine code",
            source.len(),
            code.len()
        );
        let region = ExecutableRegion::new(&code)?;
        Ok(Self { region })
    }

    /// Size of the executable mapping in bytes; a whole number of pages.
    pub fn region_len(&self) -> usize {
        self.region.len()
    }

    /// Run against `tape` with the default stdin/stdout capabilities.
    ///
    /// # Safety
    ///
    /// The generated code does not bounds-check the tape pointer: `tape`
    /// must be long enough for every `>` the program executes, and the
    /// program must not move left of the starting cell.
    pub unsafe fn run(&self, tape: &mut [u8]) {
        unsafe { self.run_with(&mut StdIo, tape) }
    }

    /// Run with caller-supplied capabilities.
    ///
    /// # Safety
    ///
    /// Same contract as [`CompiledProgram::run`].
    pub unsafe fn run_with<H: HostIo>(&self, host: &mut H, tape: &mut [u8]) {
        let entry = self.region.entry_point();
        let ctx = (host as *mut H).cast::<c_void>();
        unsafe { entry(write_shim::<H>, ctx, read_shim::<H>, ctx, tape.as_mut_ptr()) }
    }
}
