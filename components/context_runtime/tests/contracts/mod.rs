//! Contract tests for the context-variable engine
//!
//! These pin the externally observable guarantees: set/reset round trips,
//! token single-use, isolation between sibling contexts, copy-on-write
//! snapshots, chain splicing identity, and watcher notification fidelity.

use context_runtime::{Context, ContextEvent, ContextRuntime, ContextVar, CoroutineScope, Strand};
use core_types::{ErrorKind, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn fresh_strand() -> Strand {
    Strand::new(&ContextRuntime::new())
}

/// Contract: resetting the token returned by a set restores the binding
/// that was in force before the set.
#[test]
fn test_context_round_trip() {
    let mut strand = fresh_strand();
    let var = ContextVar::new("v");

    var.set(&mut strand, Value::int(1));
    let token = var.set(&mut strand, Value::int(2));
    assert_eq!(var.get(&mut strand).unwrap(), Value::int(2));

    var.reset(&mut strand, &token).unwrap();
    assert_eq!(var.get(&mut strand).unwrap(), Value::int(1));
}

/// Contract: resetting a token for a previously unbound variable restores
/// the "not found" state.
#[test]
fn test_round_trip_to_unbound() {
    let mut strand = fresh_strand();
    let var = ContextVar::new("v");

    let token = var.set(&mut strand, Value::int(1));
    var.reset(&mut strand, &token).unwrap();

    let err = var.get(&mut strand).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LookupError);
    assert!(err.message.contains("v"), "error names the variable");
}

/// Contract: a token is consumed by its first reset; the second reset fails.
#[test]
fn test_token_single_use() {
    let mut strand = fresh_strand();
    let var = ContextVar::new("v");

    let token = var.set(&mut strand, Value::int(1));
    var.reset(&mut strand, &token).unwrap();

    let err = var.reset(&mut strand, &token).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RuntimeError);
    assert!(err.message.contains("already been used once"));
}

/// Contract: sibling contexts do not leak bindings into each other.
#[test]
fn test_context_isolation() {
    let mut strand = fresh_strand();
    let var = ContextVar::new("v");

    let ctx_a = Context::new();
    strand.enter(&ctx_a).unwrap();
    var.set(&mut strand, Value::int(1));
    strand.exit(&ctx_a).unwrap();

    let ctx_b = Context::new();
    strand.enter(&ctx_b).unwrap();
    assert_eq!(
        var.get_with(&mut strand, Some(&Value::int(99))).unwrap(),
        Value::int(99)
    );
    strand.exit(&ctx_b).unwrap();
}

/// Contract: a copy sees the original's bindings at copy time and is
/// unaffected by later writes through the original.
#[test]
fn test_copy_semantics() {
    let mut strand = fresh_strand();
    let var = ContextVar::new("v");

    let ctx = Context::new();
    strand.enter(&ctx).unwrap();
    var.set(&mut strand, Value::str("old"));
    strand.exit(&ctx).unwrap();

    let snapshot = ctx.copy();
    assert_eq!(snapshot.get_in(&var), Some(Value::str("old")));

    strand.enter(&ctx).unwrap();
    var.set(&mut strand, Value::str("new"));
    strand.exit(&ctx).unwrap();

    strand.enter(&snapshot).unwrap();
    assert_eq!(var.get(&mut strand).unwrap(), Value::str("old"));
    strand.exit(&snapshot).unwrap();
}

/// Contract: activating and deactivating a coroutine scope restores the
/// exact chain state, by identity, that existed before activation.
#[test]
fn test_chain_restore_identity() {
    let mut strand = fresh_strand();
    let outer = strand.current_context();

    let scope = CoroutineScope::new();
    scope.reset_base(&mut strand, Some(&Context::new())).unwrap();

    scope.activate(&mut strand);
    let interposed = strand.active_context().unwrap();
    assert!(!Rc::ptr_eq(&interposed, &outer));

    scope.deactivate(&mut strand);
    let restored = strand.active_context().unwrap();
    assert!(Rc::ptr_eq(&restored, &outer));
}

/// Contract: two watchers observing one enter+exit cycle are each invoked
/// exactly twice, in registration order, with the correct active-context
/// argument each time.
#[test]
fn test_watcher_fidelity() {
    let runtime = ContextRuntime::new();
    let log: Rc<RefCell<Vec<(u8, ContextEvent, Option<usize>)>>> =
        Rc::new(RefCell::new(Vec::new()));

    for tag in [0u8, 1u8] {
        let sink = Rc::clone(&log);
        runtime
            .add_watcher(Box::new(move |event, ctx| {
                let identity = ctx.map(|c| Rc::as_ptr(c) as usize);
                sink.borrow_mut().push((tag, event, identity));
                Ok(())
            }))
            .unwrap();
    }

    let mut strand = Strand::new(&runtime);
    let ctx = Context::new();
    strand.enter(&ctx).unwrap();
    strand.exit(&ctx).unwrap();

    let entered_identity = Rc::as_ptr(&ctx) as usize;
    let events = log.borrow();
    assert_eq!(
        events.as_slice(),
        [
            (0, ContextEvent::Switched, Some(entered_identity)),
            (1, ContextEvent::Switched, Some(entered_identity)),
            (0, ContextEvent::Switched, None),
            (1, ContextEvent::Switched, None),
        ]
    );
}
