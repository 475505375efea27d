// This module holds the entire machine-code vocabulary of the compiler: one
// raw byte template per Brainfuck instruction plus the prologue and epilogue
// that bracket every program. Fragments are fixed-shape and parameterized
// only by relocation offsets, so CodeBuffer can stay a pure append API: the
// builder above it decides *what* to emit and never touches instruction
// bytes. Register roles are pinned for the whole run by the prologue, which
// moves the five System V argument registers into callee-saved homes so the
// generated code can call the read/write capabilities without saving
// anything itself.

//! Machine-code templates and the append-only code emitter.

use super::reloc::{PendingReloc, RelocKind, RelocTable};
use crate::error::CompileResult;

/// Saves the callee-saved registers, then stages the five incoming
/// arguments into them for the duration of the run:
///
/// | register | holds |
/// |----------|-------|
/// | `r12` | write capability |
/// | `r13` | write context |
/// | `r14` | read capability |
/// | `rbp` | read context |
/// | `rbx` | tape pointer |
const PROLOGUE: &[u8] = &[
    0x41, 0x54, // push r12
    0x41, 0x55, // push r13
    0x41, 0x56, // push r14
    0x55, //       push rbp
    0x53, //       push rbx
    0x49, 0x89, 0xfc, // mov r12, rdi
    0x49, 0x89, 0xf5, // mov r13, rsi
    0x49, 0x89, 0xd6, // mov r14, rdx
    0x48, 0x89, 0xcd, // mov rbp, rcx
    0x4c, 0x89, 0xc3, // mov rbx, r8
];

/// Restores the saved registers in reverse and returns. Every path out of a
/// program - read end-of-input, write failure, normal completion - lands
/// here.
const EPILOGUE: &[u8] = &[
    0x5b, //       pop rbx
    0x5d, //       pop rbp
    0x41, 0x5e, // pop r14
    0x41, 0x5d, // pop r13
    0x41, 0x5c, // pop r12
    0xc3, //       ret
];

const POINTER_DEC: &[u8] = &[0x48, 0x83, 0xeb, 0x01]; // sub rbx, 1
const POINTER_INC: &[u8] = &[0x48, 0x83, 0xc3, 0x01]; // add rbx, 1

// Cell arithmetic goes through al; the tape is 8-bit cells with wraparound.
const CELL_DEC: &[u8] = &[
    0x8a, 0x03, // mov al, [rbx]
    0x2c, 0x01, // sub al, 1
    0x88, 0x03, // mov [rbx], al
];
const CELL_INC: &[u8] = &[
    0x8a, 0x03, // mov al, [rbx]
    0x04, 0x01, // add al, 1
    0x88, 0x03, // mov [rbx], al
];

/// `rax = read(read_ctx)`; a negative result means end of input.
const READ_CALL: &[u8] = &[
    0x48, 0x89, 0xef, // mov rdi, rbp
    0x41, 0xff, 0xd6, // call r14
    0x48, 0x83, 0xf8, 0x00, // cmp rax, 0
];
const READ_STORE: &[u8] = &[0x88, 0x03]; // mov [rbx], al

/// `rax = write(write_ctx, byte at tape pointer)`; anything but 1 is failure.
const WRITE_CALL: &[u8] = &[
    0x4c, 0x89, 0xef, // mov rdi, r13
    0x48, 0x0f, 0xb6, 0x33, // movzx rsi, byte [rbx]
    0x41, 0xff, 0xd4, // call r12
    0x48, 0x83, 0xf8, 0x01, // cmp rax, 1
];

const LOOP_TEST: &[u8] = &[0x80, 0x3b, 0x00]; // cmp byte [rbx], 0

const JMP_REL8: u8 = 0xeb;

/// The growing code buffer and its relocation table.
///
/// Mutable only while the build runs; [`CodeBuffer::finish`] resolves every
/// relocation and hands the bytes over, after which they are never written
/// again.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    code: Vec<u8>,
    relocs: RelocTable,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current end of the buffer; the offset the next fragment lands at.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit_prologue(&mut self) {
        self.code.extend_from_slice(PROLOGUE);
    }

    pub fn emit_epilogue(&mut self) {
        self.code.extend_from_slice(EPILOGUE);
    }

    /// Jump over the epilogue that immediately follows. The epilogue length
    /// is fixed, so a rel8 jump suffices and needs no relocation.
    pub fn emit_epilogue_skip(&mut self) {
        self.code.push(JMP_REL8);
        self.code.push(EPILOGUE.len() as u8);
    }

    /// `<` - move the tape pointer one cell left.
    pub fn emit_pointer_dec(&mut self) {
        self.code.extend_from_slice(POINTER_DEC);
    }

    /// `>` - move the tape pointer one cell right.
    pub fn emit_pointer_inc(&mut self) {
        self.code.extend_from_slice(POINTER_INC);
    }

    /// `-` - decrement the current cell.
    pub fn emit_cell_dec(&mut self) {
        self.code.extend_from_slice(CELL_DEC);
    }

    /// `+` - increment the current cell.
    pub fn emit_cell_inc(&mut self) {
        self.code.extend_from_slice(CELL_INC);
    }

    /// `,` - call the read capability, exit on end of input, otherwise
    /// store the byte at the tape pointer.
    pub fn emit_read(&mut self, exit: usize) {
        self.code.extend_from_slice(READ_CALL);
        self.branch_to(RelocKind::ReadExit, exit);
        self.code.extend_from_slice(READ_STORE);
    }

    /// `.` - call the write capability with the current cell, exit on
    /// failure.
    pub fn emit_write(&mut self, exit: usize) {
        self.code.extend_from_slice(WRITE_CALL);
        self.branch_to(RelocKind::WriteExit, exit);
    }

    /// Head of a loop: test the current cell against zero.
    pub fn emit_loop_test(&mut self) {
        self.code.extend_from_slice(LOOP_TEST);
    }

    /// Placeholder branch skipping a loop body whose end is not yet known.
    pub fn emit_loop_skip(&mut self) -> PendingReloc {
        let field = self.emit_branch_opcode(RelocKind::LoopSkip);
        self.relocs.push_pending(RelocKind::LoopSkip, field)
    }

    /// Bind a loop-skip placeholder to the offset after the loop.
    pub fn bind_loop_skip(&mut self, skip: PendingReloc, target: usize) {
        self.relocs.bind(skip, target);
    }

    /// Unconditional jump to a known offset.
    pub fn emit_jump(&mut self, target: usize) {
        self.branch_to(RelocKind::Jump, target);
    }

    /// Resolve every relocation and freeze the buffer.
    pub fn finish(self) -> CompileResult<Vec<u8>> {
        let Self { mut code, relocs } = self;
        relocs.resolve_all(&mut code)?;
        Ok(code)
    }

    /// Number of relocations recorded so far.
    pub fn reloc_count(&self) -> usize {
        self.relocs.len()
    }

    fn branch_to(&mut self, kind: RelocKind, target: usize) {
        let field = self.emit_branch_opcode(kind);
        self.relocs.push_bound(kind, field, target);
    }

    /// Emit a branch opcode plus a zeroed displacement field; returns the
    /// field offset for the relocation record.
    fn emit_branch_opcode(&mut self, kind: RelocKind) -> usize {
        self.code.extend_from_slice(kind.opcode());
        let field = self.code.len();
        self.code.extend_from_slice(&[0u8; 4]);
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced_x86::{Decoder, DecoderOptions, Instruction, MemorySize, Mnemonic, Register};

    fn decode(bytes: &[u8]) -> Vec<Instruction> {
        let mut decoder = Decoder::with_ip(64, bytes, 0, DecoderOptions::NONE);
        let mut out = Vec::new();
        while decoder.can_decode() {
            out.push(decoder.decode());
        }
        out
    }

    fn mnemonics(bytes: &[u8]) -> Vec<Mnemonic> {
        decode(bytes).iter().map(|i| i.mnemonic()).collect()
    }

    #[test]
    fn prologue_saves_and_stages_registers() {
        let instrs = decode(PROLOGUE);
        assert!(instrs[..5].iter().all(|i| i.mnemonic() == Mnemonic::Push));
        assert!(instrs[5..].iter().all(|i| i.mnemonic() == Mnemonic::Mov));

        let pushed: Vec<Register> = instrs[..5].iter().map(|i| i.op0_register()).collect();
        assert_eq!(
            pushed,
            [
                Register::R12,
                Register::R13,
                Register::R14,
                Register::RBP,
                Register::RBX,
            ]
        );

        let staged: Vec<(Register, Register)> = instrs[5..]
            .iter()
            .map(|i| (i.op0_register(), i.op1_register()))
            .collect();
        assert_eq!(
            staged,
            [
                (Register::R12, Register::RDI),
                (Register::R13, Register::RSI),
                (Register::R14, Register::RDX),
                (Register::RBP, Register::RCX),
                (Register::RBX, Register::R8),
            ]
        );
    }

    #[test]
    fn epilogue_restores_in_reverse_and_returns() {
        let instrs = decode(EPILOGUE);
        assert_eq!(
            mnemonics(EPILOGUE),
            [
                Mnemonic::Pop,
                Mnemonic::Pop,
                Mnemonic::Pop,
                Mnemonic::Pop,
                Mnemonic::Pop,
                Mnemonic::Ret,
            ]
        );
        let popped: Vec<Register> = instrs[..5].iter().map(|i| i.op0_register()).collect();
        assert_eq!(
            popped,
            [
                Register::RBX,
                Register::RBP,
                Register::R14,
                Register::R13,
                Register::R12,
            ]
        );
    }

    #[test]
    fn pointer_templates_move_rbx_by_one() {
        for (bytes, mnemonic) in [(POINTER_INC, Mnemonic::Add), (POINTER_DEC, Mnemonic::Sub)] {
            let instrs = decode(bytes);
            assert_eq!(instrs.len(), 1);
            assert_eq!(instrs[0].mnemonic(), mnemonic);
            assert_eq!(instrs[0].op0_register(), Register::RBX);
            assert_eq!(instrs[0].immediate(1), 1);
        }
    }

    #[test]
    fn cell_templates_are_byte_wide() {
        for (bytes, mnemonic) in [(CELL_INC, Mnemonic::Add), (CELL_DEC, Mnemonic::Sub)] {
            let instrs = decode(bytes);
            assert_eq!(
                instrs.iter().map(|i| i.mnemonic()).collect::<Vec<_>>(),
                [Mnemonic::Mov, mnemonic, Mnemonic::Mov]
            );
            // load and store go through al against [rbx]
            assert_eq!(instrs[0].op0_register(), Register::AL);
            assert_eq!(instrs[0].memory_base(), Register::RBX);
            assert_eq!(instrs[2].memory_size(), MemorySize::UInt8);
        }
    }

    #[test]
    fn read_fragment_exits_on_negative_result() {
        let mut buf = CodeBuffer::new();
        buf.emit_read(0x40);
        let code = buf.finish().unwrap();

        let instrs = decode(&code);
        assert_eq!(
            instrs.iter().map(|i| i.mnemonic()).collect::<Vec<_>>(),
            [
                Mnemonic::Mov,
                Mnemonic::Call,
                Mnemonic::Cmp,
                Mnemonic::Jl,
                Mnemonic::Mov,
            ]
        );
        assert_eq!(instrs[1].op0_register(), Register::R14);
        assert_eq!(instrs[3].near_branch_target(), 0x40);
        // the stored result is one byte, not the whole of rax
        assert_eq!(instrs[4].memory_size(), MemorySize::UInt8);
        assert_eq!(instrs[4].op1_register(), Register::AL);
    }

    #[test]
    fn write_fragment_exits_on_failure() {
        let mut buf = CodeBuffer::new();
        buf.emit_write(0x20);
        let code = buf.finish().unwrap();

        let instrs = decode(&code);
        assert_eq!(
            instrs.iter().map(|i| i.mnemonic()).collect::<Vec<_>>(),
            [
                Mnemonic::Mov,
                Mnemonic::Movzx,
                Mnemonic::Call,
                Mnemonic::Cmp,
                Mnemonic::Jne,
            ]
        );
        assert_eq!(instrs[1].memory_base(), Register::RBX);
        assert_eq!(instrs[2].op0_register(), Register::R12);
        assert_eq!(instrs[4].near_branch_target(), 0x20);
    }

    #[test]
    fn loop_skeleton_branches_line_up() {
        let mut buf = CodeBuffer::new();
        let head = buf.offset();
        buf.emit_loop_test();
        let skip = buf.emit_loop_skip();
        buf.emit_cell_dec();
        buf.emit_jump(head);
        let done = buf.offset();
        buf.bind_loop_skip(skip, done);
        let code = buf.finish().unwrap();

        let instrs = decode(&code);
        assert_eq!(
            instrs.iter().map(|i| i.mnemonic()).collect::<Vec<_>>(),
            [
                Mnemonic::Cmp,
                Mnemonic::Je,
                Mnemonic::Mov,
                Mnemonic::Sub,
                Mnemonic::Mov,
                Mnemonic::Jmp,
            ]
        );
        // skip lands just past the back-edge; back-edge returns to the test
        assert_eq!(instrs[1].near_branch_target() as usize, done);
        assert_eq!(instrs[5].near_branch_target() as usize, head);
        assert_eq!(instrs[0].memory_base(), Register::RBX);
        assert_eq!(instrs[0].immediate(1), 0);
    }

    #[test]
    fn epilogue_skip_lands_after_epilogue() {
        let mut buf = CodeBuffer::new();
        buf.emit_epilogue_skip();
        buf.emit_epilogue();
        let code = buf.finish().unwrap();

        let instrs = decode(&code);
        assert_eq!(instrs[0].mnemonic(), Mnemonic::Jmp);
        assert_eq!(instrs[0].near_branch_target() as usize, code.len());
    }
}
