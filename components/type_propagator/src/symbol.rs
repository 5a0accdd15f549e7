//! The abstract value lattice and its arena.
//!
//! Each stack slot and local tracked during type propagation holds a
//! [`Symbol`]: a nullability state plus an optional known type and known
//! constant. The states form a small lattice:
//!
//! - `Top`: nothing known
//! - `Null` / `NotNull`: definitely unbound / definitely a value
//! - `Bottom`: contradictory (both claimed), nothing can be concluded
//!
//! A known constant implies `NotNull` and a known type (the constant's
//! type). Setting a type on a symbol that already has a different one
//! overwrites it; there is no union type and no join operator, because the
//! propagator only ever walks straight-line traces.
//!
//! Symbols live in a fixed-capacity arena and are addressed by stable
//! [`SymbolId`] handles. Nothing is freed individually; the whole arena is
//! reset between optimizer passes, at which point every outstanding id is
//! invalidated.

use core_types::{TypeRef, Value};

/// Nullability component of the lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    /// Nothing known yet
    Top,
    /// Definitely no value (an unbound slot)
    Null,
    /// Definitely a value
    NotNull,
    /// Contradictory information
    Bottom,
}

/// One abstract value: nullability, optional known type, optional constant
#[derive(Debug, Clone)]
pub struct Symbol {
    nullability: Nullability,
    typ: Option<TypeRef>,
    const_val: Option<Value>,
}

impl Symbol {
    /// A symbol about which nothing is known (`Top`)
    pub fn unknown() -> Self {
        Self {
            nullability: Nullability::Top,
            typ: None,
            const_val: None,
        }
    }

    /// A symbol known to hold some value of unknown type
    pub fn not_null() -> Self {
        let mut sym = Self::unknown();
        sym.set_non_null();
        sym
    }

    /// A symbol known to be unbound
    pub fn null() -> Self {
        let mut sym = Self::unknown();
        sym.set_null();
        sym
    }

    /// A symbol known to hold a value of the given type
    pub fn typed(typ: TypeRef) -> Self {
        let mut sym = Self::unknown();
        sym.set_type(typ);
        sym
    }

    /// A symbol known to hold exactly `value`
    ///
    /// Implies `NotNull` and a known type (the value's type).
    pub fn constant(value: Value, typ: TypeRef) -> Self {
        let mut sym = Self::typed(typ);
        sym.const_val = Some(value);
        sym
    }

    /// The symbol's nullability state
    pub fn nullability(&self) -> Nullability {
        self.nullability
    }

    /// Whether the slot is definitely unbound (exactly `Null`, not `Bottom`)
    pub fn is_null(&self) -> bool {
        self.nullability == Nullability::Null
    }

    /// Whether the slot definitely holds a value (exactly `NotNull`)
    pub fn is_not_null(&self) -> bool {
        self.nullability == Nullability::NotNull
    }

    /// Whether the symbol has contradicted itself
    pub fn is_bottom(&self) -> bool {
        self.nullability == Nullability::Bottom
    }

    /// Whether a constant value is recorded
    pub fn is_const(&self) -> bool {
        self.const_val.is_some()
    }

    /// The recorded constant, if any
    pub fn get_const(&self) -> Option<&Value> {
        self.const_val.as_ref()
    }

    /// The known type, if any
    pub fn get_type(&self) -> Option<&TypeRef> {
        self.typ.as_ref()
    }

    /// Whether the symbol's known type is exactly `typ` (identity)
    pub fn matches_type(&self, typ: &TypeRef) -> bool {
        self.typ.as_ref() == Some(typ)
    }

    /// Assert a type for this symbol, also marking it `NotNull`
    ///
    /// Overwrites any previously known type (last write wins). A recorded
    /// constant is left in place; `matches_type` reflects only the most
    /// recent type.
    pub fn set_type(&mut self, typ: TypeRef) {
        self.typ = Some(typ);
        self.set_non_null();
    }

    /// Assert that the slot is unbound
    pub fn set_null(&mut self) {
        self.nullability = match self.nullability {
            Nullability::Top | Nullability::Null => Nullability::Null,
            Nullability::NotNull | Nullability::Bottom => Nullability::Bottom,
        };
    }

    /// Assert that the slot holds a value
    pub fn set_non_null(&mut self) {
        self.nullability = match self.nullability {
            Nullability::Top | Nullability::NotNull => Nullability::NotNull,
            Nullability::Null | Nullability::Bottom => Nullability::Bottom,
        };
    }
}

/// Stable handle to a [`Symbol`] in a [`SymbolArena`]
///
/// Valid until the arena is reset; handles from a previous pass must not be
/// reused afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    /// Sentinel for slots that have been grown but never written
    pub(crate) const INVALID: SymbolId = SymbolId(u32::MAX);
}

/// Fixed-capacity arena of symbols
///
/// Allocation fails (returns `None`) when the capacity is exhausted; the
/// caller treats that as an abort-this-pass condition, never as a fatal
/// error.
#[derive(Debug)]
pub struct SymbolArena {
    cells: Vec<Symbol>,
    capacity: usize,
}

impl SymbolArena {
    /// Create an arena bounded to `capacity` symbols
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Number of live symbols
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no symbols are allocated
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Allocate a symbol, returning `None` when the arena is full
    pub fn alloc(&mut self, sym: Symbol) -> Option<SymbolId> {
        if self.cells.len() >= self.capacity {
            return None;
        }
        let id = SymbolId(self.cells.len() as u32);
        self.cells.push(sym);
        Some(id)
    }

    /// Read a symbol
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.cells[id.0 as usize]
    }

    /// Mutate a symbol in place
    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.cells[id.0 as usize]
    }

    /// Drop every symbol and start a new generation
    ///
    /// All previously returned ids become invalid.
    pub fn reset(&mut self) {
        self.cells.clear();
    }
}
