//! Loop matching and recursive-descent code generation.
//!
//! [`ProgramBuilder`] walks the source text once and drives the
//! [`CodeBuffer`] one emission per instruction. Loops recurse: `[` finds its
//! matching `]`, the body is generated as a nested sequence, and the
//! loop-skip placeholder is bound once the body's end offset is known. A
//! build either produces a fully relocated byte buffer or fails as a whole;
//! an unmatched `[` aborts through every recursion level.

use log::trace;

use crate::error::{CompileError, CompileResult};
use crate::x64::CodeBuffer;

/// Offset of the `]` closing the loop whose body starts `tail`, or `None`
/// if the source ends first. `tail` begins just after the opening `[`;
/// nesting depth starts at 1 and `]` at depth 0 is the match.
pub fn find_loop_end(tail: &[u8]) -> Option<usize> {
    let mut depth = 1usize;
    for (i, &byte) in tail.iter().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Syntax-directed emitter for one whole program.
pub struct ProgramBuilder<'src> {
    source: &'src [u8],
    code: CodeBuffer,
    /// Offset of the epilogue; every exit path jumps here. Fixed before any
    /// program instruction is emitted.
    exit_offset: usize,
}

impl<'src> ProgramBuilder<'src> {
    pub fn new(source: &'src [u8]) -> Self {
        Self {
            source,
            code: CodeBuffer::new(),
            exit_offset: 0,
        }
    }

    /// Emit the complete program and resolve all relocations.
    ///
    /// Layout: prologue, a rel8 jump over the epilogue, the epilogue, the
    /// translated instruction sequence, and a final jump back to the
    /// epilogue for normal completion.
    pub fn build(mut self) -> CompileResult<Vec<u8>> {
        self.code.emit_prologue();
        self.code.emit_epilogue_skip();
        self.exit_offset = self.code.offset();
        self.code.emit_epilogue();

        let source = self.source;
        self.generate_sequence(source)?;
        self.code.emit_jump(self.exit_offset);

        trace!(
            "program body emitted, {} relocations to resolve",
            self.code.reloc_count()
        );
        self.code.finish()
    }

    fn generate_sequence(&mut self, src: &[u8]) -> CompileResult<()> {
        let mut i = 0;
        while i < src.len() {
            match src[i] {
                b'<' => self.code.emit_pointer_dec(),
                b'>' => self.code.emit_pointer_inc(),
                b'-' => self.code.emit_cell_dec(),
                b'+' => self.code.emit_cell_inc(),
                b',' => self.code.emit_read(self.exit_offset),
                b'.' => self.code.emit_write(self.exit_offset),
                b'[' => {
                    let tail = &src[i + 1..];
                    let Some(close) = find_loop_end(tail) else {
                        return Err(CompileError::UnmatchedLoop {
                            context: String::from_utf8_lossy(&src[i..]).into_owned(),
                        });
                    };
                    self.generate_loop(&tail[..close])?;
                    // resume after the matched ']'
                    i += close + 1;
                }
                // comment byte; a stray ']' is skipped like one
                _ => {}
            }
            i += 1;
        }
        Ok(())
    }

    /// `[body]` becomes: test the cell, conditionally skip past the body,
    /// the body, a jump back to the test. The skip target is bound last.
    fn generate_loop(&mut self, body: &[u8]) -> CompileResult<()> {
        let head = self.code.offset();
        self.code.emit_loop_test();
        let skip = self.code.emit_loop_skip();

        self.generate_sequence(body)?;

        self.code.emit_jump(head);
        let done = self.code.offset();
        self.code.bind_loop_skip(skip, done);
        trace!("loop at {head:#x}, skip bound to {done:#x}");
        Ok(())
    }
}
