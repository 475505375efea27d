//! Error types for the compiler.
//!
//! Using thiserror for more idiomatic error handling. Every build failure is
//! reported through [`CompileError`]; a failed build never leaves a partial
//! program behind.

use std::io;

use thiserror::Error;

use crate::x64::reloc::RelocKind;

/// Main error type for program compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    /// A `[` with no matching `]`. Carries the source text from the
    /// offending bracket to the end of the program.
    #[error("unable to find loop end in block starting with: {context}")]
    UnmatchedLoop { context: String },

    /// A displacement field reached the patch pass without a target. This is
    /// a defect in the builder, not in the source program.
    #[error("unresolved {kind:?} relocation at offset {offset:#x}")]
    UnresolvedRelocation { kind: RelocKind, offset: usize },

    /// The anonymous mapping for the finished code could not be acquired.
    #[error("failed to map {len} bytes for executable code: {source}")]
    Map { len: usize, source: io::Error },

    /// The mapping could not be transitioned to execute+read-only.
    #[error("failed to make code region executable: {source}")]
    Protect { source: io::Error },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
