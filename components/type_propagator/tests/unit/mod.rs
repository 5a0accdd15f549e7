//! Unit tests for the type propagator

use bytecode_system::{CodeShape, Instruction, Opcode};
use core_types::{TypeRegistry, Value};
use std::collections::HashMap;
use std::rc::Rc;
use type_propagator::{
    Abort, Nullability, PropagatorConfig, PropagatorContext, Symbol, MAX_ABSTRACT_FRAME_DEPTH,
};

fn context() -> (PropagatorContext, TypeRegistry) {
    let registry = TypeRegistry::new();
    let ctx = PropagatorContext::new(&registry, &PropagatorConfig::new());
    (ctx, registry)
}

// ============================================================================
// Lattice Tests
// ============================================================================

#[test]
fn test_nullability_transitions() {
    let mut sym = Symbol::unknown();
    assert_eq!(sym.nullability(), Nullability::Top);

    sym.set_non_null();
    assert_eq!(sym.nullability(), Nullability::NotNull);

    sym.set_null();
    assert_eq!(sym.nullability(), Nullability::Bottom);

    // Bottom is absorbing
    sym.set_non_null();
    assert_eq!(sym.nullability(), Nullability::Bottom);
}

#[test]
fn test_null_then_not_null_is_bottom() {
    let mut sym = Symbol::null();
    assert!(sym.is_null());
    sym.set_non_null();
    assert!(sym.is_bottom());
}

#[test]
fn test_set_type_marks_not_null() {
    let registry = TypeRegistry::new();
    let mut sym = Symbol::unknown();
    sym.set_type(registry.list_type.clone());
    assert!(sym.is_not_null());
    assert!(sym.matches_type(&registry.list_type));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = PropagatorConfig::new();
    assert_eq!(config.symbol_arena_size, 1024);
    assert_eq!(config.slot_arena_size, 4096);
    assert!(config.max_frame_depth <= MAX_ABSTRACT_FRAME_DEPTH);
    assert_eq!(config, PropagatorConfig::default());
}

#[test]
fn test_abort_messages_are_distinguishable() {
    let messages: Vec<String> = [
        Abort::OutOfSymbols,
        Abort::OutOfSlots,
        Abort::FrameDepthExceeded,
    ]
    .iter()
    .map(|a| a.to_string())
    .collect();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| !m.is_empty()));
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);
}

// ============================================================================
// Pass-Level Tests
// ============================================================================

#[test]
fn test_store_fast_moves_stack_symbol_to_local() {
    let (mut ctx, registry) = context();
    let mut code = CodeShape::new("f", 1, 2);
    let pi = code.add_const(Value::Float(3.14));
    let code = Rc::new(code);

    ctx.begin(&code).unwrap();
    ctx.step(Instruction::new(Opcode::LoadConst, pi as u32), None)
        .unwrap();
    ctx.step(Instruction::new(Opcode::StoreFast, 0), None).unwrap();

    assert_eq!(ctx.stack_depth(), 0);
    let local = ctx.sym(ctx.local(0));
    assert!(local.matches_type(&registry.float_type));
    assert_eq!(local.get_const(), Some(&Value::Float(3.14)));
}

#[test]
fn test_delete_fast_marks_local_unbound() {
    let (mut ctx, _registry) = context();
    let code = Rc::new(CodeShape::new("f", 1, 2));

    ctx.begin(&code).unwrap();
    ctx.step(Instruction::new(Opcode::DeleteFast, 0), None).unwrap();
    assert!(ctx.sym(ctx.local(0)).is_null());
}

#[test]
fn test_check_not_null_refines_slot() {
    let (mut ctx, _registry) = context();
    let code = Rc::new(CodeShape::new("f", 1, 2));

    ctx.begin(&code).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 0), None).unwrap();
    assert!(!ctx.sym(ctx.peek(1)).is_not_null());

    ctx.step(Instruction::new(Opcode::CheckNotNull, 0), None)
        .unwrap();
    assert!(ctx.sym(ctx.peek(1)).is_not_null());
    assert!(ctx.sym(ctx.local(0)).is_not_null());
}

#[test]
fn test_build_ops_produce_container_types() {
    let (mut ctx, registry) = context();
    let code = Rc::new(CodeShape::new("f", 2, 8));

    ctx.begin(&code).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 0), None).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 1), None).unwrap();
    ctx.step(Instruction::new(Opcode::BuildList, 2), None).unwrap();
    assert!(ctx.sym(ctx.peek(1)).matches_type(&registry.list_type));

    ctx.step(Instruction::new(Opcode::LoadFast, 0), None).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 1), None).unwrap();
    ctx.step(Instruction::new(Opcode::BuildMap, 1), None).unwrap();
    assert!(ctx.sym(ctx.peek(1)).matches_type(&registry.dict_type));
    assert_eq!(ctx.stack_depth(), 2);
}

#[test]
fn test_conditional_jumps_model_fall_through() {
    let (mut ctx, _registry) = context();
    let code = Rc::new(CodeShape::new("f", 1, 4));

    ctx.begin(&code).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 0), None).unwrap();
    ctx.step(Instruction::new(Opcode::PopJumpIfFalse, 7), None)
        .unwrap();
    assert_eq!(ctx.stack_depth(), 0);

    ctx.step(Instruction::new(Opcode::LoadFast, 0), None).unwrap();
    ctx.step(Instruction::new(Opcode::JumpIfTrueOrPop, 9), None)
        .unwrap();
    assert_eq!(ctx.stack_depth(), 0);
}

#[test]
fn test_non_inlined_call_pushes_unknown_result() {
    let (mut ctx, _registry) = context();
    let code = Rc::new(CodeShape::new("f", 2, 8));

    ctx.begin(&code).unwrap();
    ctx.step(Instruction::new(Opcode::LoadGlobal, 0), None).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 0), None).unwrap();
    ctx.step(Instruction::new(Opcode::LoadFast, 1), None).unwrap();
    ctx.step(Instruction::new(Opcode::Call, 2), None).unwrap();

    assert_eq!(ctx.stack_depth(), 1);
    let result = ctx.sym(ctx.peek(1));
    assert!(result.get_type().is_none());
    assert!(!result.is_const());
}

#[test]
fn test_deep_inlining_aborts_recoverably() {
    let registry = TypeRegistry::new();
    let mut ctx = PropagatorContext::new(
        &registry,
        &PropagatorConfig {
            symbol_arena_size: 256,
            slot_arena_size: 1024,
            max_frame_depth: 3,
        },
    );
    let code = Rc::new(CodeShape::new("f", 0, 4));
    let trace = vec![
        Instruction::new(Opcode::LoadGlobal, 0),
        Instruction::new(Opcode::Call, 0),
    ];
    let targets: HashMap<usize, Rc<CodeShape>> = [(1, Rc::clone(&code))].into();

    ctx.begin(&code).unwrap();
    ctx.run(&trace, &targets).unwrap();
    assert_eq!(ctx.frame_depth(), 2);
    ctx.run(&trace, &targets).unwrap();
    assert_eq!(ctx.frame_depth(), 3);
    assert_eq!(ctx.run(&trace, &targets), Err(Abort::FrameDepthExceeded));
}
