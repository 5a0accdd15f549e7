//! Contract tests for the abstract interpreter
//!
//! These pin the observable guarantees of the lattice and the propagation
//! pass, including the documented type-overwrite policy.

use bytecode_system::{CodeShape, Instruction, Opcode};
use core_types::{TypeRegistry, Value};
use std::collections::HashMap;
use std::rc::Rc;
use type_propagator::{PropagatorConfig, PropagatorContext};

fn context() -> (PropagatorContext, TypeRegistry) {
    let registry = TypeRegistry::new();
    let ctx = PropagatorContext::new(&registry, &PropagatorConfig::new());
    (ctx, registry)
}

/// Contract: a constant symbol reports its constant, and overwriting its
/// type afterwards keeps the stored constant while `matches_type` reflects
/// the most recent type assertion.
#[test]
fn test_constant_symbol_and_type_overwrite_policy() {
    let (mut ctx, registry) = context();
    let code = Rc::new(CodeShape::new("f", 0, 2));
    ctx.begin(&code).unwrap();

    let id = ctx.new_const(&Value::int(5)).unwrap();
    assert!(ctx.sym(id).is_const());
    assert_eq!(ctx.sym(id).get_const(), Some(&Value::int(5)));
    assert!(ctx.sym(id).matches_type(&registry.int_type));

    let float_type = registry.float_type.clone();
    ctx.sym_mut(id).set_type(float_type);
    assert!(!ctx.sym(id).matches_type(&registry.int_type));
    assert!(ctx.sym(id).matches_type(&registry.float_type));
    assert!(ctx.sym(id).is_const());
}

/// Contract: the end-to-end scenario. Over a frame where local `x` is
/// seeded `KnownType(int)`, the trace
/// `[push-local(x), push-const(1), binary-add-int, store-local(y)]`
/// leaves local `y` holding `KnownType(int)` and returns the stack to its
/// pre-sequence depth.
#[test]
fn test_end_to_end_int_add_trace() {
    let (mut ctx, registry) = context();
    let mut code = CodeShape::new("f", 2, 4);
    let one = code.add_const(Value::int(1));
    let code = Rc::new(code);

    ctx.begin(&code).unwrap();
    let seeded = ctx.new_type(registry.int_type.clone()).unwrap();
    ctx.set_local(0, seeded);
    let depth_before = ctx.stack_depth();

    let trace = vec![
        Instruction::new(Opcode::LoadFast, 0),
        Instruction::new(Opcode::LoadConst, one as u32),
        Instruction::new(Opcode::BinaryOpAddInt, 0),
        Instruction::new(Opcode::StoreFast, 1),
    ];
    ctx.run(&trace, &HashMap::new()).unwrap();

    assert_eq!(ctx.stack_depth(), depth_before);
    assert!(ctx.sym(ctx.local(1)).matches_type(&registry.int_type));
}

/// Contract: guard micro-ops feed type information forward. After a
/// CheckFloat guard, a later use of the same slot observes the asserted
/// type without re-checking.
#[test]
fn test_guard_feeds_forward() {
    let (mut ctx, registry) = context();
    let code = Rc::new(CodeShape::new("f", 2, 4));

    ctx.begin(&code).unwrap();
    let trace = vec![
        Instruction::new(Opcode::LoadFast, 0),
        Instruction::new(Opcode::LoadFast, 1),
        // Guard both operands of the upcoming float add
        Instruction::new(Opcode::CheckFloat, 0),
        Instruction::new(Opcode::CheckFloat, 1),
        Instruction::new(Opcode::BinaryOpAddFloat, 0),
        Instruction::new(Opcode::StoreFast, 0),
    ];
    ctx.run(&trace, &HashMap::new()).unwrap();

    // The guard on the stack copies refined both locals
    assert!(ctx.sym(ctx.local(0)).matches_type(&registry.float_type));
    assert!(ctx.sym(ctx.local(1)).matches_type(&registry.float_type));
}

/// Contract: an aborted pass leaves the context reusable. After resetting,
/// the same context completes a smaller pass.
#[test]
fn test_abort_is_recoverable() {
    let registry = TypeRegistry::new();
    let mut ctx = PropagatorContext::new(
        &registry,
        &PropagatorConfig {
            symbol_arena_size: 6,
            slot_arena_size: 64,
            max_frame_depth: 4,
        },
    );
    let mut code = CodeShape::new("f", 0, 16);
    let one = code.add_const(Value::int(1));
    let code = Rc::new(code);

    let long_trace: Vec<Instruction> = (0..16)
        .map(|_| Instruction::new(Opcode::LoadConst, one as u32))
        .collect();
    ctx.begin(&code).unwrap();
    assert!(ctx.run(&long_trace, &HashMap::new()).is_err());

    let short_trace = vec![Instruction::new(Opcode::LoadConst, one as u32)];
    ctx.begin(&code).unwrap();
    ctx.run(&short_trace, &HashMap::new()).unwrap();
    assert_eq!(ctx.sym(ctx.peek(1)).get_const(), Some(&Value::int(1)));
}
