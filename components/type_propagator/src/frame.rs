//! Abstract call frames.
//!
//! One [`AbstractFrame`] per (possibly inlined) call level maps the frame's
//! locals and evaluation stack onto a contiguous region of the propagator's
//! shared slot buffer. Frames own no storage: they carry base offsets and a
//! stack pointer, and are created and destroyed purely by adjusting the
//! owning context's frame depth and consumed-slot counter.

use bytecode_system::CodeShape;
use std::rc::Rc;

/// One abstract call level over the shared slot buffer
///
/// Layout within the buffer: `nlocals` local slots starting at
/// `locals_base`, immediately followed by `stack_size` stack slots. Growing
/// the stack does not initialize slots; the per-opcode handlers always
/// write a slot before anything reads it.
#[derive(Debug, Clone)]
pub struct AbstractFrame {
    code: Rc<CodeShape>,
    locals_base: usize,
    stack_base: usize,
    stack_top: usize,
}

impl AbstractFrame {
    pub(crate) fn new(code: Rc<CodeShape>, locals_base: usize, stack_entries: usize) -> Self {
        assert!(
            stack_entries <= code.stack_size,
            "initial stack exceeds declared stacksize"
        );
        let stack_base = locals_base + code.nlocals;
        Self {
            code,
            locals_base,
            stack_base,
            stack_top: stack_entries,
        }
    }

    /// The code object this frame executes
    pub fn code(&self) -> &Rc<CodeShape> {
        &self.code
    }

    /// First buffer index of this frame's region
    pub fn locals_base(&self) -> usize {
        self.locals_base
    }

    /// Current evaluation-stack depth
    pub fn stack_depth(&self) -> usize {
        self.stack_top
    }

    /// Buffer index one past this frame's region
    pub fn region_end(&self) -> usize {
        self.stack_base + self.code.stack_size
    }

    /// Buffer index of local `i`
    pub fn local_slot(&self, i: usize) -> usize {
        assert!(i < self.code.nlocals, "local index out of range");
        self.locals_base + i
    }

    /// Buffer index of the stack slot `depth` items from the top (1 = top)
    pub fn peek_slot(&self, depth: usize) -> usize {
        assert!(
            depth >= 1 && depth <= self.stack_top,
            "stack peek below the stack"
        );
        self.stack_base + self.stack_top - depth
    }

    /// Move the stack pointer up by `n` slots without initializing them
    pub fn grow(&mut self, n: usize) {
        assert!(
            self.stack_top + n <= self.code.stack_size,
            "stack grows past declared stacksize"
        );
        self.stack_top += n;
    }

    /// Move the stack pointer down by `n` slots
    ///
    /// The forgotten slots are left as-is; they are rewritten before any
    /// later read.
    pub fn shrink(&mut self, n: usize) {
        assert!(self.stack_top >= n, "stack shrinks below empty");
        self.stack_top -= n;
    }
}
