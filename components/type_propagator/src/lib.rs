//! Tier-2 type propagation for the bytecode runtime.
//!
//! This crate implements the symbolic abstract interpreter that annotates
//! stack and local slots with inferred value types, driving the selection
//! of type-specialized opcodes:
//!
//! - [`Symbol`] / [`SymbolArena`]: the abstract value lattice
//!   (Top / Null / NotNull / Bottom, plus known type and known constant)
//!   in a fixed-capacity, handle-addressed arena
//! - [`AbstractFrame`]: one (possibly inlined) call level over a shared
//!   locals+stack slot buffer
//! - [`PropagatorContext`]: per-pass state with bounded capacities and a
//!   table-driven [`step`](PropagatorContext::step)/[`run`](PropagatorContext::run)
//!   pass over micro-op traces
//!
//! Exhausting any capacity aborts the pass with a distinguishable
//! [`Abort`]; the caller falls back to unoptimized execution.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{CodeShape, Instruction, Opcode};
//! use core_types::{TypeRegistry, Value};
//! use std::collections::HashMap;
//! use std::rc::Rc;
//! use type_propagator::{PropagatorConfig, PropagatorContext};
//!
//! let registry = TypeRegistry::new();
//! let mut ctx = PropagatorContext::new(&registry, &PropagatorConfig::new());
//!
//! let mut code = CodeShape::new("f", 1, 4);
//! let one = code.add_const(Value::int(1));
//! code.emit(Opcode::LoadFast, 0);
//! code.emit(Opcode::LoadConst, one as u32);
//! code.emit(Opcode::BinaryOpAddInt, 0);
//! code.emit(Opcode::StoreFast, 0);
//! let code = Rc::new(code);
//!
//! ctx.begin(&code).unwrap();
//! ctx.run(&code.code, &HashMap::new()).unwrap();
//! assert!(ctx.sym(ctx.local(0)).matches_type(&registry.int_type));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod interp;
pub mod propagate;
pub mod symbol;

// Re-export main types at crate root
pub use frame::AbstractFrame;
pub use interp::{Abort, PropagatorConfig, PropagatorContext, MAX_ABSTRACT_FRAME_DEPTH};
pub use symbol::{Nullability, Symbol, SymbolArena, SymbolId};
