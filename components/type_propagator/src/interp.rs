//! The abstract interpreter context.
//!
//! A [`PropagatorContext`] owns everything one type-propagation pass needs:
//! the symbol arena, the shared locals+stack slot buffer, and the bounded
//! stack of abstract frames. One context serves one optimizer invocation at
//! a time; `reset`/`begin` start a new generation and invalidate all
//! symbol ids from the previous pass.
//!
//! Running out of any fixed-capacity resource is reported as an [`Abort`],
//! which the caller treats as "give up optimizing this trace and fall back
//! to unoptimized execution" — never as a fatal error.

use crate::frame::AbstractFrame;
use crate::symbol::{Symbol, SymbolArena, SymbolId};
use arrayvec::ArrayVec;
use bytecode_system::CodeShape;
use core_types::{TypeRef, TypeRegistry, Value};
use std::fmt;
use std::rc::Rc;

/// Hard upper bound on abstract frame depth (the config may bound lower)
pub const MAX_ABSTRACT_FRAME_DEPTH: usize = 16;

/// Why a propagation pass was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    /// The symbol arena is exhausted
    OutOfSymbols,
    /// The locals+stack slot buffer is exhausted
    OutOfSlots,
    /// Inlining would exceed the configured frame depth
    FrameDepthExceeded,
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::OutOfSymbols => write!(f, "out of space for abstract symbols"),
            Abort::OutOfSlots => write!(f, "out of space for abstract frame slots"),
            Abort::FrameDepthExceeded => write!(f, "abstract frame depth exceeded"),
        }
    }
}

/// Capacity configuration for one propagator context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagatorConfig {
    /// Maximum symbols allocated per pass
    pub symbol_arena_size: usize,
    /// Maximum locals+stack slots across all inlined frames
    pub slot_arena_size: usize,
    /// Maximum abstract call depth (at most [`MAX_ABSTRACT_FRAME_DEPTH`])
    pub max_frame_depth: usize,
}

impl PropagatorConfig {
    /// Default capacities
    pub fn new() -> Self {
        Self {
            symbol_arena_size: 1024,
            slot_arena_size: 4096,
            max_frame_depth: 10,
        }
    }

    /// Small capacities, for exercising exhaustion paths
    pub fn compact() -> Self {
        Self {
            symbol_arena_size: 32,
            slot_arena_size: 64,
            max_frame_depth: 4,
        }
    }
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// State for one abstract-interpretation pass
#[derive(Debug)]
pub struct PropagatorContext {
    arena: SymbolArena,
    slots: Vec<SymbolId>,
    slot_limit: usize,
    frames: ArrayVec<AbstractFrame, MAX_ABSTRACT_FRAME_DEPTH>,
    max_frame_depth: usize,
    registry: TypeRegistry,
}

impl PropagatorContext {
    /// Create a context with the given type registry and capacities
    pub fn new(registry: &TypeRegistry, config: &PropagatorConfig) -> Self {
        assert!(
            config.max_frame_depth <= MAX_ABSTRACT_FRAME_DEPTH,
            "configured frame depth exceeds the hard bound"
        );
        Self {
            arena: SymbolArena::new(config.symbol_arena_size),
            slots: Vec::new(),
            slot_limit: config.slot_arena_size,
            frames: ArrayVec::new(),
            max_frame_depth: config.max_frame_depth,
            registry: registry.clone(),
        }
    }

    /// The registry this context classifies values against
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Discard all pass state and start a new generation
    pub fn reset(&mut self) {
        self.arena.reset();
        self.slots.clear();
        self.frames.clear();
    }

    /// Reset and push the root frame for `code`, with every local and no
    /// stack entries
    pub fn begin(&mut self, code: &Rc<CodeShape>) -> Result<(), Abort> {
        self.reset();
        self.push_frame(Rc::clone(code), &[], 0)
    }

    // ------------------------------------------------------------------
    // Symbol constructors (fail with OutOfSymbols when the arena is full)
    // ------------------------------------------------------------------

    /// Allocate a `Top` symbol
    pub fn new_unknown(&mut self) -> Result<SymbolId, Abort> {
        self.alloc(Symbol::unknown())
    }

    /// Allocate a `NotNull` symbol
    pub fn new_not_null(&mut self) -> Result<SymbolId, Abort> {
        self.alloc(Symbol::not_null())
    }

    /// Allocate a `Null` symbol
    pub fn new_null(&mut self) -> Result<SymbolId, Abort> {
        self.alloc(Symbol::null())
    }

    /// Allocate a symbol with a known type
    pub fn new_type(&mut self, typ: TypeRef) -> Result<SymbolId, Abort> {
        self.alloc(Symbol::typed(typ))
    }

    /// Allocate a symbol with a known constant value
    pub fn new_const(&mut self, value: &Value) -> Result<SymbolId, Abort> {
        let typ = self.registry.type_of(value);
        self.alloc(Symbol::constant(value.clone(), typ))
    }

    fn alloc(&mut self, sym: Symbol) -> Result<SymbolId, Abort> {
        self.arena.alloc(sym).ok_or(Abort::OutOfSymbols)
    }

    /// Read a symbol
    pub fn sym(&self, id: SymbolId) -> &Symbol {
        self.arena.get(id)
    }

    /// Mutate a symbol in place
    ///
    /// Mutation is how guard insertion feeds type information forward: a
    /// slot's symbol may be shared between a local and stack copies of it,
    /// and refining one refines them all.
    pub fn sym_mut(&mut self, id: SymbolId) -> &mut Symbol {
        self.arena.get_mut(id)
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Current abstract call depth
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// The innermost frame
    pub fn frame(&self) -> &AbstractFrame {
        self.frames.last().expect("no active frame")
    }

    /// Push a frame for `code`, seeding its first locals from `args`
    ///
    /// Locals not covered by `args` and the `stack_entries` initial stack
    /// slots are fresh unknowns.
    pub fn push_frame(
        &mut self,
        code: Rc<CodeShape>,
        args: &[SymbolId],
        stack_entries: usize,
    ) -> Result<(), Abort> {
        if self.frames.len() >= self.max_frame_depth {
            return Err(Abort::FrameDepthExceeded);
        }
        assert!(
            args.len() <= code.nlocals,
            "more arguments than declared locals"
        );
        let locals_base = self.slots.len();
        if locals_base + code.slot_count() > self.slot_limit {
            return Err(Abort::OutOfSlots);
        }

        self.slots.extend_from_slice(args);
        for _ in args.len()..code.nlocals {
            let local = self.new_unknown()?;
            self.slots.push(local);
        }
        // Reserve the stack region; only the initial entries are defined
        for i in 0..code.stack_size {
            if i < stack_entries {
                let entry = self.new_unknown()?;
                self.slots.push(entry);
            } else {
                self.slots.push(SymbolId::INVALID);
            }
        }

        self.frames
            .push(AbstractFrame::new(code, locals_base, stack_entries));
        Ok(())
    }

    /// Pop the innermost frame, releasing its slot region
    pub fn pop_frame(&mut self) {
        let frame = self.frames.pop().expect("no frame to pop");
        self.slots.truncate(frame.locals_base());
    }

    // ------------------------------------------------------------------
    // Stack and locals of the innermost frame
    // ------------------------------------------------------------------

    /// Current stack depth of the innermost frame
    pub fn stack_depth(&self) -> usize {
        self.frame().stack_depth()
    }

    /// Push a symbol onto the stack
    pub fn push(&mut self, sym: SymbolId) {
        self.frames.last_mut().expect("no active frame").grow(1);
        let slot = self.frame().peek_slot(1);
        self.slots[slot] = sym;
    }

    /// Pop `n` symbols off the stack, forgetting them
    pub fn shrink(&mut self, n: usize) {
        self.frames.last_mut().expect("no active frame").shrink(n);
    }

    /// Move the stack pointer up by `n` uninitialized slots
    ///
    /// Every grown slot must be overwritten before it is read.
    pub fn grow(&mut self, n: usize) {
        self.frames.last_mut().expect("no active frame").grow(n);
    }

    /// The symbol `depth` items from the top of the stack (1 = top)
    pub fn peek(&self, depth: usize) -> SymbolId {
        let id = self.slots[self.frame().peek_slot(depth)];
        debug_assert!(id != SymbolId::INVALID, "read of an unwritten stack slot");
        id
    }

    /// Replace the symbol `depth` items from the top of the stack
    pub fn overwrite(&mut self, depth: usize, sym: SymbolId) {
        let slot = self.frame().peek_slot(depth);
        self.slots[slot] = sym;
    }

    /// The symbol held by local `i`
    pub fn local(&self, i: usize) -> SymbolId {
        self.slots[self.frame().local_slot(i)]
    }

    /// Replace the symbol held by local `i`
    pub fn set_local(&mut self, i: usize, sym: SymbolId) {
        let slot = self.frame().local_slot(i);
        self.slots[slot] = sym;
    }
}
