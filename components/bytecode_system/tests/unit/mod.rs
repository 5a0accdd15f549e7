//! Unit tests for bytecode metadata tables

use bytecode_system::{BinaryOpKind, CodeShape, Instruction, JumpKind, Opcode};
use core_types::Value;

// ============================================================================
// Opcode Table Tests
// ============================================================================

#[test]
fn test_table_has_no_duplicate_codes() {
    let mut seen = [false; 256];
    for &op in Opcode::ALL {
        let code = op as usize;
        assert!(!seen[code], "duplicate opcode number {}", code);
        seen[code] = true;
    }
}

#[test]
fn test_from_byte_rejects_gaps() {
    // 13..32 is a gap in the numbering epoch
    for code in 13..32 {
        assert_eq!(Opcode::from_byte(code), None);
    }
}

#[test]
fn test_has_arg_bands() {
    assert!(!Opcode::PopTop.has_arg());
    assert!(!Opcode::BinarySubscr.has_arg());
    assert!(Opcode::LoadFast.has_arg());
    assert!(Opcode::CheckInt.has_arg());
    // Specialized subscript variants inherit the family's bare form
    assert!(!Opcode::BinarySubscrListInt.has_arg());
}

#[test]
fn test_jump_classification_is_exclusive() {
    for &op in Opcode::ALL {
        let desc = op.descriptor();
        assert!(
            !(desc.is_relative_jump && desc.is_absolute_jump),
            "{} classified as both jump kinds",
            op.mnemonic()
        );
        if desc.is_relative_jump || desc.is_absolute_jump {
            assert!(desc.has_argument, "{} jumps without an argument", op.mnemonic());
        }
    }
}

#[test]
fn test_relative_and_absolute_jump_sets() {
    let relative: Vec<Opcode> = Opcode::ALL
        .iter()
        .copied()
        .filter(|op| op.jump_kind() == JumpKind::Relative)
        .collect();
    let absolute: Vec<Opcode> = Opcode::ALL
        .iter()
        .copied()
        .filter(|op| op.jump_kind() == JumpKind::Absolute)
        .collect();

    assert_eq!(
        relative,
        vec![Opcode::JumpForward, Opcode::JumpBackward, Opcode::ForIter]
    );
    assert_eq!(
        absolute,
        vec![
            Opcode::PopJumpIfFalse,
            Opcode::PopJumpIfTrue,
            Opcode::JumpIfFalseOrPop,
            Opcode::JumpIfTrueOrPop,
        ]
    );
}

#[test]
fn test_constant_using_set() {
    let with_const: Vec<Opcode> = Opcode::ALL
        .iter()
        .copied()
        .filter(|op| op.uses_constant())
        .collect();
    assert_eq!(with_const, vec![Opcode::LoadConst, Opcode::ReturnConst]);
}

#[test]
fn test_specialized_families() {
    // Every BinaryOp specialization deopts to BinaryOp
    for op in [
        Opcode::BinaryOpAddInt,
        Opcode::BinaryOpAddFloat,
        Opcode::BinaryOpAddStr,
        Opcode::BinaryOpSubtractInt,
        Opcode::BinaryOpSubtractFloat,
        Opcode::BinaryOpMultiplyInt,
        Opcode::BinaryOpMultiplyFloat,
    ] {
        assert_eq!(op.deopt(), Opcode::BinaryOp);
        assert!(op.is_specialized());
    }
    assert!(!Opcode::BinaryOp.is_specialized());
}

#[test]
fn test_guard_micro_ops_are_generic() {
    for op in [
        Opcode::CheckInt,
        Opcode::CheckFloat,
        Opcode::CheckStr,
        Opcode::CheckList,
        Opcode::CheckNotNull,
    ] {
        assert!(!op.is_specialized());
        assert_eq!(op.cache_entries(), 0);
    }
}

// ============================================================================
// BinaryOpKind Tests
// ============================================================================

#[test]
fn test_binary_op_kind_covers_argument_space() {
    for oparg in 0..12 {
        let kind = BinaryOpKind::from_oparg(oparg).expect("kind defined");
        assert_eq!(kind.to_oparg(), oparg);
    }
    assert_eq!(BinaryOpKind::from_oparg(12), None);
}

// ============================================================================
// CodeShape Tests
// ============================================================================

#[test]
fn test_code_shape_new() {
    let shape = CodeShape::new("main", 3, 8);
    assert_eq!(shape.nlocals, 3);
    assert_eq!(shape.stack_size, 8);
    assert!(shape.code.is_empty());
    assert!(shape.consts.is_empty());
}

#[test]
fn test_code_shape_const_indices_are_stable() {
    let mut shape = CodeShape::new("f", 0, 2);
    let a = shape.add_const(Value::int(1));
    let b = shape.add_const(Value::str("two"));
    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(shape.consts[b], Value::str("two"));
}

#[test]
fn test_instruction_equality() {
    assert_eq!(
        Instruction::new(Opcode::LoadFast, 1),
        Instruction::new(Opcode::LoadFast, 1)
    );
    assert_ne!(
        Instruction::new(Opcode::LoadFast, 1),
        Instruction::new(Opcode::LoadFast, 2)
    );
}
