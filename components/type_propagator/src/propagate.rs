//! The table-driven propagation pass.
//!
//! For each micro-op in a linear trace, one handler below applies the op's
//! static stack effect to the current abstract frame and pushes symbols per
//! the op's known result-type contract: specialized arithmetic pushes its
//! result type, generic operations push unknowns, comparisons push `bool`,
//! and guard micro-ops refine the checked slot's symbol in place so the
//! asserted type flows forward to every later use.
//!
//! Control flow is deliberately straight-line: the pass models the
//! fall-through path of conditional jumps and performs no merging across
//! branches. Inlined calls push an abstract frame seeded with the argument
//! symbols; returns pop it, propagating only the return-value symbol.
//!
//! The match below is the semantics table. It enumerates every opcode
//! without a wildcard so that extending the instruction set forces a
//! decision here.

use crate::interp::{Abort, PropagatorContext};
use bytecode_system::{CodeShape, Instruction, Opcode};
use std::collections::HashMap;
use std::rc::Rc;

impl PropagatorContext {
    /// Propagate one micro-op
    ///
    /// `inline_target` supplies the callee's code shape when this
    /// instruction is a call the optimizer chose to inline.
    pub fn step(
        &mut self,
        instr: Instruction,
        inline_target: Option<&Rc<CodeShape>>,
    ) -> Result<(), Abort> {
        let oparg = instr.oparg as usize;
        match instr.opcode {
            Opcode::Cache | Opcode::Nop => {}

            Opcode::PopTop => self.shrink(1),

            Opcode::PushNull => {
                let sym = self.new_null()?;
                self.push(sym);
            }

            Opcode::UnaryNegative | Opcode::UnaryInvert => {
                let sym = self.new_unknown()?;
                self.overwrite(1, sym);
            }

            Opcode::UnaryNot => {
                let bool_type = self.registry().bool_type.clone();
                let sym = self.new_type(bool_type)?;
                self.overwrite(1, sym);
            }

            Opcode::BinaryOp => {
                self.shrink(1);
                let sym = self.new_unknown()?;
                self.overwrite(1, sym);
            }

            Opcode::BinaryOpAddInt
            | Opcode::BinaryOpSubtractInt
            | Opcode::BinaryOpMultiplyInt => {
                self.shrink(1);
                let int_type = self.registry().int_type.clone();
                let sym = self.new_type(int_type)?;
                self.overwrite(1, sym);
            }

            Opcode::BinaryOpAddFloat
            | Opcode::BinaryOpSubtractFloat
            | Opcode::BinaryOpMultiplyFloat => {
                self.shrink(1);
                let float_type = self.registry().float_type.clone();
                let sym = self.new_type(float_type)?;
                self.overwrite(1, sym);
            }

            Opcode::BinaryOpAddStr => {
                self.shrink(1);
                let str_type = self.registry().str_type.clone();
                let sym = self.new_type(str_type)?;
                self.overwrite(1, sym);
            }

            Opcode::BinarySubscr
            | Opcode::BinarySubscrListInt
            | Opcode::BinarySubscrDict => {
                self.shrink(1);
                let sym = self.new_unknown()?;
                self.overwrite(1, sym);
            }

            Opcode::BinarySubscrStrInt => {
                self.shrink(1);
                let str_type = self.registry().str_type.clone();
                let sym = self.new_type(str_type)?;
                self.overwrite(1, sym);
            }

            Opcode::StoreSubscr | Opcode::StoreSubscrListInt | Opcode::StoreSubscrDict => {
                self.shrink(3)
            }

            Opcode::DeleteSubscr => self.shrink(2),

            Opcode::GetIter => {
                let sym = self.new_not_null()?;
                self.overwrite(1, sym);
            }

            Opcode::GetLen => {
                let int_type = self.registry().int_type.clone();
                let sym = self.new_type(int_type)?;
                self.push(sym);
            }

            Opcode::ReturnValue => {
                if self.frame_depth() > 1 {
                    let ret = self.peek(1);
                    self.shrink(1);
                    self.pop_frame();
                    self.push(ret);
                } else {
                    self.shrink(1);
                }
            }

            Opcode::ReturnConst => {
                let value = self.frame().code().consts[oparg].clone();
                let ret = self.new_const(&value)?;
                if self.frame_depth() > 1 {
                    self.pop_frame();
                    self.push(ret);
                }
            }

            Opcode::LoadConst => {
                let value = self.frame().code().consts[oparg].clone();
                let sym = self.new_const(&value)?;
                self.push(sym);
            }

            Opcode::LoadFast => {
                // The stack copy shares the local's symbol, so a later
                // guard on either refines both
                let sym = self.local(oparg);
                self.push(sym);
            }

            Opcode::StoreFast => {
                let sym = self.peek(1);
                self.set_local(oparg, sym);
                self.shrink(1);
            }

            Opcode::DeleteFast => {
                let sym = self.new_null()?;
                self.set_local(oparg, sym);
            }

            Opcode::LoadGlobal => {
                let sym = self.new_unknown()?;
                self.push(sym);
            }

            Opcode::LoadGlobalModule | Opcode::LoadGlobalBuiltin => {
                let sym = self.new_not_null()?;
                self.push(sym);
            }

            Opcode::StoreGlobal => self.shrink(1),
            Opcode::DeleteGlobal => {}

            Opcode::LoadAttr => {
                let sym = self.new_unknown()?;
                self.overwrite(1, sym);
            }

            Opcode::LoadAttrInstance | Opcode::LoadAttrModule => {
                let sym = self.new_not_null()?;
                self.overwrite(1, sym);
            }

            Opcode::StoreAttr | Opcode::StoreAttrInstance => self.shrink(2),
            Opcode::DeleteAttr => self.shrink(1),

            Opcode::CompareOp
            | Opcode::CompareOpInt
            | Opcode::CompareOpFloat
            | Opcode::CompareOpStr => {
                self.shrink(1);
                let bool_type = self.registry().bool_type.clone();
                let sym = self.new_type(bool_type)?;
                self.overwrite(1, sym);
            }

            Opcode::Call | Opcode::CallPyExact => {
                if let Some(callee) = inline_target {
                    let argc = oparg;
                    let args: Vec<_> = (0..argc).map(|i| self.peek(argc - i)).collect();
                    self.shrink(argc + 1);
                    self.push_frame(Rc::clone(callee), &args, 0)?;
                } else {
                    self.shrink(oparg);
                    let sym = self.new_unknown()?;
                    self.overwrite(1, sym);
                }
            }

            Opcode::CallBuiltin => {
                self.shrink(oparg);
                let sym = self.new_unknown()?;
                self.overwrite(1, sym);
            }

            Opcode::UnpackSequence
            | Opcode::UnpackSequenceList
            | Opcode::UnpackSequenceTuple
            | Opcode::UnpackSequenceTwoTuple => {
                self.shrink(1);
                self.grow(oparg);
                for depth in 1..=oparg {
                    let sym = self.new_unknown()?;
                    self.overwrite(depth, sym);
                }
            }

            Opcode::Swap => {
                let top = self.peek(1);
                let other = self.peek(oparg);
                self.overwrite(1, other);
                self.overwrite(oparg, top);
            }

            Opcode::Copy => {
                let sym = self.peek(oparg);
                self.push(sym);
            }

            Opcode::BuildList => {
                self.shrink(oparg);
                let list_type = self.registry().list_type.clone();
                let sym = self.new_type(list_type)?;
                self.push(sym);
            }

            Opcode::BuildTuple => {
                self.shrink(oparg);
                let tuple_type = self.registry().tuple_type.clone();
                let sym = self.new_type(tuple_type)?;
                self.push(sym);
            }

            Opcode::BuildMap => {
                self.shrink(2 * oparg);
                let dict_type = self.registry().dict_type.clone();
                let sym = self.new_type(dict_type)?;
                self.push(sym);
            }

            // Straight-line trace: unconditional jumps have no stack
            // effect, conditional jumps model the fall-through path
            Opcode::JumpForward | Opcode::JumpBackward => {}

            Opcode::ForIter => {
                let sym = self.new_unknown()?;
                self.push(sym);
            }

            Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue => self.shrink(1),

            // Fall-through pops; only the taken branch keeps the value
            Opcode::JumpIfFalseOrPop | Opcode::JumpIfTrueOrPop => self.shrink(1),

            Opcode::CheckInt => {
                let int_type = self.registry().int_type.clone();
                let id = self.peek(1 + oparg);
                self.sym_mut(id).set_type(int_type);
            }

            Opcode::CheckFloat => {
                let float_type = self.registry().float_type.clone();
                let id = self.peek(1 + oparg);
                self.sym_mut(id).set_type(float_type);
            }

            Opcode::CheckStr => {
                let str_type = self.registry().str_type.clone();
                let id = self.peek(1 + oparg);
                self.sym_mut(id).set_type(str_type);
            }

            Opcode::CheckList => {
                let list_type = self.registry().list_type.clone();
                let id = self.peek(1 + oparg);
                self.sym_mut(id).set_type(list_type);
            }

            Opcode::CheckNotNull => {
                let id = self.peek(1 + oparg);
                self.sym_mut(id).set_non_null();
            }
        }
        Ok(())
    }

    /// Propagate a whole trace
    ///
    /// `inline_targets` maps trace indices of call instructions to the
    /// callee code shapes the optimizer chose to inline at those sites.
    pub fn run(
        &mut self,
        trace: &[Instruction],
        inline_targets: &HashMap<usize, Rc<CodeShape>>,
    ) -> Result<(), Abort> {
        for (index, instr) in trace.iter().enumerate() {
            self.step(*instr, inline_targets.get(&index))?;
        }
        Ok(())
    }
}
