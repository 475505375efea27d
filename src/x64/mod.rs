//! x86-64 architecture-specific components.
//!
//! Everything that knows instruction encodings lives in this module:
//!
//! - [`emitter`] - raw byte templates and the append-only code buffer
//! - [`reloc`] - relative-branch relocation records and the patch pass
//!
//! Orchestration code above this module never inspects raw bytes; it calls
//! one emission routine per source instruction and hands branch targets to
//! the relocation table.

pub mod emitter;
pub mod reloc;

pub use emitter::CodeBuffer;
pub use reloc::{PendingReloc, RelocKind, RelocTable, Relocation};
