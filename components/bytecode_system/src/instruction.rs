//! Instruction and code-shape containers.
//!
//! A [`CodeShape`] is the narrow view of a compiled code object that this
//! crate's consumers need: how many local slots and stack slots it declares,
//! its constant pool, and its instruction sequence. The full code-object
//! machinery (names, line tables, exception tables) lives upstream.

use crate::opcode::Opcode;
use core_types::Value;

/// One decoded instruction: an opcode plus its argument
///
/// Opcodes without an argument carry zero. Inline-cache slots are not
/// materialized here; consumers skip `opcode.cache_entries()` code units
/// when walking raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation to perform
    pub opcode: Opcode,
    /// The operand (zero when the opcode takes none)
    pub oparg: u32,
}

impl Instruction {
    /// Create an instruction with an argument
    pub fn new(opcode: Opcode, oparg: u32) -> Self {
        Self { opcode, oparg }
    }

    /// Create an argument-less instruction
    pub fn op(opcode: Opcode) -> Self {
        Self { opcode, oparg: 0 }
    }
}

/// The declared shape of one compiled code object
#[derive(Debug, Clone, PartialEq)]
pub struct CodeShape {
    /// Name of the function this code belongs to
    pub name: String,
    /// Number of local variable slots (parameters included)
    pub nlocals: usize,
    /// Maximum evaluation-stack depth the verifier guarantees
    pub stack_size: usize,
    /// Constant pool for literal operands
    pub consts: Vec<Value>,
    /// Instruction sequence
    pub code: Vec<Instruction>,
}

impl CodeShape {
    /// Create an empty code shape with the given slot declaration
    pub fn new(name: impl Into<String>, nlocals: usize, stack_size: usize) -> Self {
        Self {
            name: name.into(),
            nlocals,
            stack_size,
            consts: Vec::new(),
            code: Vec::new(),
        }
    }

    /// Append an instruction
    pub fn emit(&mut self, opcode: Opcode, oparg: u32) {
        self.code.push(Instruction::new(opcode, oparg));
    }

    /// Add a constant to the pool and return its index
    pub fn add_const(&mut self, value: Value) -> usize {
        let idx = self.consts.len();
        self.consts.push(value);
        idx
    }

    /// Total locals-plus-stack slots this code needs in one frame
    pub fn slot_count(&self) -> usize {
        self.nlocals + self.stack_size
    }
}
