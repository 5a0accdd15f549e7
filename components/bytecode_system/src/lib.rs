//! Bytecode instruction set and static dispatch metadata.
//!
//! This crate provides the opcode enumeration together with every static
//! per-opcode attribute the dispatch loop and the tiered optimizer consume:
//!
//! - Inline-cache entry counts (how many code units to skip per opcode)
//! - Argument presence and constant-pool usage
//! - Relative/absolute jump classification
//! - The specialized-to-generic deoptimization mapping
//!
//! All tables are generated from a single source of truth in
//! [`opcode`], so the enumeration and its attributes cannot drift apart.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{JumpKind, Opcode};
//!
//! // A specialized opcode de-specializes to its generic family head
//! assert_eq!(Opcode::BinaryOpAddInt.deopt(), Opcode::BinaryOp);
//! assert_eq!(Opcode::BinaryOp.cache_entries(), 1);
//! assert_eq!(Opcode::JumpForward.jump_kind(), JumpKind::Relative);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod instruction;
pub mod opcode;

// Re-export main types at crate root
pub use instruction::{CodeShape, Instruction};
pub use opcode::{BinaryOpKind, JumpKind, Opcode, OpcodeDescriptor};
