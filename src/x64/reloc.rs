//! Relative-branch relocations.
//!
//! Every branch the emitter produces ends in a 4-byte little-endian signed
//! displacement, measured from the end of the displacement field. Instead of
//! splicing bytes ad hoc, each branch is recorded as a typed
//! [`Relocation`] and every displacement is written in one patch pass,
//! [`RelocTable::resolve_all`], after emission finishes. Most records are
//! single-phase (the target is known when the branch is emitted); the loop
//! skip is the only two-phase form and is bound through a [`PendingReloc`]
//! token once the loop body's end offset is known.

use crate::error::{CompileError, CompileResult};

/// Branch forms appearing in generated code. Each kind fixes the opcode
/// bytes emitted ahead of the displacement field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// `jmp rel32` - loop back-edge and the final end-of-program jump.
    Jump,
    /// `jl rel32` to the exit block, taken when the read capability signals
    /// end of input with a negative result.
    ReadExit,
    /// `jne rel32` to the exit block, taken when the write capability
    /// reports failure.
    WriteExit,
    /// `je rel32` skipping a loop body while the current cell is zero. The
    /// only two-phase form: its target is bound after the body is emitted.
    LoopSkip,
}

impl RelocKind {
    /// Opcode bytes that precede the displacement field.
    pub fn opcode(self) -> &'static [u8] {
        match self {
            RelocKind::Jump => &[0xe9],
            RelocKind::ReadExit => &[0x0f, 0x8c],
            RelocKind::WriteExit => &[0x0f, 0x85],
            RelocKind::LoopSkip => &[0x0f, 0x84],
        }
    }
}

/// One displacement field awaiting the patch pass.
#[derive(Debug)]
pub struct Relocation {
    pub kind: RelocKind,
    /// Buffer offset of the 4-byte displacement field.
    pub field: usize,
    /// Branch target as a buffer offset; `None` until bound.
    pub target: Option<usize>,
}

/// Token for a two-phase relocation. Binding consumes it, so a placeholder
/// cannot be bound twice.
#[derive(Debug)]
#[must_use = "a pending relocation must be bound before the patch pass"]
pub struct PendingReloc(usize);

/// All relocations of one build, resolved together once emission is done.
#[derive(Debug, Default)]
pub struct RelocTable {
    entries: Vec<Relocation>,
}

impl RelocTable {
    /// Record a single-phase relocation whose target is already known.
    pub fn push_bound(&mut self, kind: RelocKind, field: usize, target: usize) {
        self.entries.push(Relocation {
            kind,
            field,
            target: Some(target),
        });
    }

    /// Record a two-phase relocation; the returned token binds it later.
    pub fn push_pending(&mut self, kind: RelocKind, field: usize) -> PendingReloc {
        self.entries.push(Relocation {
            kind,
            field,
            target: None,
        });
        PendingReloc(self.entries.len() - 1)
    }

    /// Bind a two-phase relocation to its now-known target.
    pub fn bind(&mut self, pending: PendingReloc, target: usize) {
        self.entries[pending.0].target = Some(target);
    }

    /// The patch pass: write every displacement into `code`. Rejects any
    /// record still missing a target.
    pub fn resolve_all(&self, code: &mut [u8]) -> CompileResult<()> {
        for reloc in &self.entries {
            let target = reloc.target.ok_or(CompileError::UnresolvedRelocation {
                kind: reloc.kind,
                offset: reloc.field,
            })?;
            let disp = displacement(reloc.field, target);
            code[reloc.field..reloc.field + 4].copy_from_slice(&disp.to_le_bytes());
        }
        Ok(())
    }

    /// Number of recorded relocations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Displacement from a 4-byte field at `field` to `target`, as relative
/// branches encode it: measured from the end of the field.
pub(crate) fn displacement(field: usize, target: usize) -> i32 {
    (target as i64 - (field as i64 + 4)) as i32
}
