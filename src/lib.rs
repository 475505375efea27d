//! bfjit - Brainfuck compiled to native x86-64 machine code.
//!
//! The compiler walks the source text once, appending a fixed machine-code
//! fragment per instruction, resolves all relative branches in a dedicated
//! patch pass, and seals the finished buffer in an execute-only mapping.
//! There is no intermediate representation and no optimizer: the trade is
//! interpretation overhead for near-native speed at a few hundred lines.
//!
//! # Primary Usage
//!
//! ```no_run
//! use bfjit::CompiledProgram;
//!
//! let program = CompiledProgram::compile("++++++[>+++++++<-]>.")?;
//! let mut tape = vec![0u8; 30_000];
//! // Safety: the program never moves the tape pointer out of `tape`.
//! unsafe { program.run(&mut tape) };
//! # Ok::<(), bfjit::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`builder`] - loop matching and recursive-descent code generation
//! - [`x64`] - instruction templates, the code emitter, branch relocations
//! - [`exec`] - the writable-then-executable memory lifecycle (W^X)
//! - [`host`] - the capability contract between generated code and the host
//! - [`program`] - the compiled-program handle returned to embedders

pub mod builder;
pub mod error;
pub mod exec;
pub mod host;
pub mod program;
pub mod x64;

pub use error::{CompileError, CompileResult};
pub use host::{HostIo, StdIo};
pub use program::CompiledProgram;
