//! Contexts, context variables, and rollback tokens.
//!
//! A [`Context`] is an immutable-per-version snapshot of variable bindings
//! backed by the persistent map in [`crate::hamt`]. Contexts are entered and
//! exited like stack frames on a per-strand chain; a [`ContextVar`] resolves
//! against whichever context is active on the calling [`Strand`]. Setting a
//! variable returns a one-shot [`Token`] that can restore the previous
//! binding.
//!
//! Process-wide state (the watcher table, strand id allocation) lives in an
//! explicit [`ContextRuntime`] object injected into each strand, not in
//! globals.

use crate::chain::{new_link, ContextChain, LinkHandle};
use crate::hamt::Hamt;
use core_types::{Value, VmError};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of concurrently registered context watchers
pub const MAX_CONTEXT_WATCHERS: usize = 8;

/// Event delivered to context watchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEvent {
    /// The active context of the notifying strand changed
    Switched,
}

/// Watcher callback invoked on every context switch
///
/// The second argument is the strand's newly active context, or `None` when
/// the last context was just exited. Errors returned from a callback are
/// reported through the runtime's unraisable hook and never propagate into
/// the operation that triggered the switch.
pub type WatchCallback = Box<dyn FnMut(ContextEvent, Option<&Rc<Context>>) -> Result<(), VmError>>;

type WatcherSlot = Rc<RefCell<WatchCallback>>;

/// Process-wide context runtime state: watcher registry and strand ids
///
/// One runtime is shared (via `Rc`) by every strand it hosts. The watcher
/// table is a fixed array of [`MAX_CONTEXT_WATCHERS`] slots tracked by a
/// bitmask; registration returns the slot index as a handle.
pub struct ContextRuntime {
    watchers: RefCell<[Option<WatcherSlot>; MAX_CONTEXT_WATCHERS]>,
    active_watchers: Cell<u8>,
    unraisable: RefCell<Box<dyn FnMut(&VmError)>>,
    next_strand_id: Cell<u64>,
}

impl ContextRuntime {
    /// Create a new runtime with no watchers registered
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            watchers: RefCell::new(std::array::from_fn(|_| None)),
            active_watchers: Cell::new(0),
            unraisable: RefCell::new(Box::new(|err| {
                eprintln!("context watcher error ignored: {}", err);
            })),
            next_strand_id: Cell::new(1),
        })
    }

    /// Register a watcher and return its slot handle
    ///
    /// Fails when all [`MAX_CONTEXT_WATCHERS`] slots are taken.
    pub fn add_watcher(&self, callback: WatchCallback) -> Result<usize, VmError> {
        let mut slots = self.watchers.borrow_mut();
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(Rc::new(RefCell::new(callback)));
                self.active_watchers
                    .set(self.active_watchers.get() | (1 << i));
                return Ok(i);
            }
        }
        Err(VmError::runtime_error(
            "no more context watcher IDs available",
        ))
    }

    /// Remove a previously registered watcher
    ///
    /// Fails on an out-of-range handle or a slot that is not set.
    pub fn clear_watcher(&self, watcher_id: usize) -> Result<(), VmError> {
        if watcher_id >= MAX_CONTEXT_WATCHERS {
            return Err(VmError::value_error(format!(
                "invalid context watcher ID {}",
                watcher_id
            )));
        }
        let mut slots = self.watchers.borrow_mut();
        if slots[watcher_id].is_none() {
            return Err(VmError::value_error(format!(
                "no context watcher set for ID {}",
                watcher_id
            )));
        }
        slots[watcher_id] = None;
        self.active_watchers
            .set(self.active_watchers.get() & !(1 << watcher_id));
        Ok(())
    }

    /// Replace the hook that receives swallowed watcher errors
    ///
    /// The default hook writes to stderr.
    pub fn set_unraisable_hook(&self, hook: Box<dyn FnMut(&VmError)>) {
        *self.unraisable.borrow_mut() = hook;
    }

    fn notify_watchers(&self, event: ContextEvent, ctx: Option<&Rc<Context>>) {
        // Snapshot the active slots so a callback mutating the registry
        // cannot invalidate this round of notifications.
        let bits = self.active_watchers.get();
        let snapshot: Vec<WatcherSlot> = {
            let slots = self.watchers.borrow();
            (0..MAX_CONTEXT_WATCHERS)
                .filter(|i| bits & (1 << i) != 0)
                .filter_map(|i| slots[i].clone())
                .collect()
        };
        for callback in snapshot {
            if let Err(err) = (*callback.borrow_mut())(event, ctx) {
                (*self.unraisable.borrow_mut())(&err);
            }
        }
    }

    fn alloc_strand_id(&self) -> u64 {
        let id = self.next_strand_id.get();
        self.next_strand_id.set(id + 1);
        id
    }
}

impl fmt::Debug for ContextRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRuntime")
            .field("active_watchers", &self.active_watchers.get())
            .finish()
    }
}

/// One logical strand of execution (a thread of control)
///
/// Owns the strand's context chain and its context-switch generation
/// counter. Strands sharing a [`ContextRuntime`] share its watcher table;
/// everything else here is strand-local.
#[derive(Debug)]
pub struct Strand {
    runtime: Rc<ContextRuntime>,
    id: u64,
    switch_generation: u64,
    chain: ContextChain,
}

impl Strand {
    /// Create a strand hosted by the given runtime
    pub fn new(runtime: &Rc<ContextRuntime>) -> Self {
        Self {
            runtime: Rc::clone(runtime),
            id: runtime.alloc_strand_id(),
            switch_generation: 0,
            chain: ContextChain::new(),
        }
    }

    /// The strand's unique id within its runtime
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The strand's context-switch generation counter
    ///
    /// Incremented on every switch; the per-variable read cache keys on it.
    pub fn generation(&self) -> u64 {
        self.switch_generation
    }

    /// The hosting runtime
    pub fn runtime(&self) -> &Rc<ContextRuntime> {
        &self.runtime
    }

    /// The currently active context, without creating one
    pub fn active_context(&mut self) -> Option<Rc<Context>> {
        self.chain.head().borrow().top.clone()
    }

    /// The current context, creating and entering an empty one on first use
    ///
    /// Lazy creation counts as a context switch and notifies watchers.
    pub fn current_context(&mut self) -> Rc<Context> {
        let link = self.chain.head();
        let existing = link.borrow().top.clone();
        match existing {
            Some(ctx) => ctx,
            None => {
                let ctx = Context::new();
                enter_on_link(&link, &ctx).expect("a fresh context cannot be entered");
                self.context_switched();
                ctx
            }
        }
    }

    /// Enter a context, making it the strand's active context
    ///
    /// Fails if the context is already entered anywhere.
    pub fn enter(&mut self, ctx: &Rc<Context>) -> Result<(), VmError> {
        let link = self.chain.head();
        enter_on_link(&link, ctx)?;
        self.context_switched();
        Ok(())
    }

    /// Exit a context, restoring whatever was active before it
    ///
    /// Fails if the context is not entered, or entered but not the strand's
    /// current context (out-of-order exit).
    pub fn exit(&mut self, ctx: &Rc<Context>) -> Result<(), VmError> {
        let link = self.chain.head();
        exit_on_link(&link, ctx)?;
        let emptied = {
            let l = link.borrow();
            l.top.is_none() && !l.is_anchor
        };
        if emptied {
            // A coroutine scope that exited its last context leaves the chain
            self.chain.unlink(&link);
        }
        self.context_switched();
        Ok(())
    }

    fn context_switched(&mut self) {
        self.switch_generation += 1;
        let active = self.chain.head().borrow().top.clone();
        self.runtime
            .notify_watchers(ContextEvent::Switched, active.as_ref());
    }
}

fn enter_on_link(link: &LinkHandle, ctx: &Rc<Context>) -> Result<(), VmError> {
    if ctx.entered.get() {
        return Err(VmError::runtime_error(format!(
            "cannot enter context: {:?} is already entered",
            ctx
        )));
    }
    let mut link = link.borrow_mut();
    *ctx.prev.borrow_mut() = link.top.take();
    link.top = Some(Rc::clone(ctx));
    ctx.entered.set(true);
    Ok(())
}

fn exit_on_link(link: &LinkHandle, ctx: &Rc<Context>) -> Result<(), VmError> {
    if !ctx.entered.get() {
        return Err(VmError::runtime_error(format!(
            "cannot exit context: {:?} has not been entered",
            ctx
        )));
    }
    let mut link = link.borrow_mut();
    let is_top = matches!(&link.top, Some(top) if Rc::ptr_eq(top, ctx));
    if !is_top {
        return Err(VmError::runtime_error(
            "cannot exit context: not the current context",
        ));
    }
    link.top = ctx.prev.borrow_mut().take();
    ctx.entered.set(false);
    Ok(())
}

/// An immutable-per-version snapshot of context-variable bindings
///
/// Entering pushes the context onto the calling strand's chain; while
/// entered, [`ContextVar::set`] rebinds this context's map to a new
/// persistent version. A context can be entered from at most one place at a
/// time.
pub struct Context {
    vars: RefCell<Hamt<ContextVar, Value>>,
    entered: Cell<bool>,
    prev: RefCell<Option<Rc<Context>>>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(Hamt::new()),
            entered: Cell::new(false),
            prev: RefCell::new(None),
        })
    }

    /// Create a context seeing the same bindings as `self` at copy time
    ///
    /// O(1): both contexts share the same persistent map version until one
    /// of them writes.
    pub fn copy(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(self.vars.borrow().clone()),
            entered: Cell::new(false),
            prev: RefCell::new(None),
        })
    }

    /// Whether the context is currently entered somewhere
    pub fn is_entered(&self) -> bool {
        self.entered.get()
    }

    /// Look up a variable in this context (not the active one)
    pub fn get_in(&self, var: &ContextVar) -> Option<Value> {
        self.vars.borrow().find(var).cloned()
    }

    /// Number of variables bound in this context
    pub fn len(&self) -> usize {
        self.vars.borrow().len()
    }

    /// Whether no variables are bound
    pub fn is_empty(&self) -> bool {
        self.vars.borrow().is_empty()
    }

    /// Whether `var` is bound in this context
    pub fn contains(&self, var: &ContextVar) -> bool {
        self.vars.borrow().find(var).is_some()
    }

    /// The variables bound in this context, in the map's stable order
    pub fn keys(&self) -> Vec<ContextVar> {
        self.vars.borrow().keys().cloned().collect()
    }

    /// The bound values, in the map's stable order
    pub fn values(&self) -> Vec<Value> {
        self.vars.borrow().values().cloned().collect()
    }

    /// All bindings, in the map's stable order
    pub fn entries(&self) -> Vec<(ContextVar, Value)> {
        self.vars
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether two contexts hold equal bindings (structural comparison)
    pub fn vars_eq(&self, other: &Context) -> bool {
        *self.vars.borrow() == *other.vars.borrow()
    }

    /// Enter this context, run `f`, and exit again
    ///
    /// The exit is attempted even when `f` fails; an exit failure takes
    /// precedence over `f`'s result.
    pub fn run<T>(
        self: &Rc<Self>,
        strand: &mut Strand,
        f: impl FnOnce(&mut Strand) -> Result<T, VmError>,
    ) -> Result<T, VmError> {
        strand.enter(self)?;
        let result = f(strand);
        strand.exit(self)?;
        result
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Context entries={} entered={}>",
            self.vars.borrow().len(),
            self.entered.get()
        )
    }
}

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

struct CachedRead {
    value: Value,
    strand_id: u64,
    generation: u64,
}

struct VarInner {
    name: String,
    default: Option<Value>,
    hash: u64,
    cached: RefCell<Option<CachedRead>>,
}

/// A named variable resolved against the active context
///
/// Cloning a `ContextVar` clones a handle; equality and hashing are by
/// identity, with the hash precomputed from the name and a unique id so
/// that equal names still spread across the map.
///
/// Each variable carries a single-entry read cache valid only for one
/// `(strand, switch generation)` pair. The cache is a strand-local fast
/// path; it must not be relied on when one variable handle is shared
/// across preemptively parallel strands.
#[derive(Clone)]
pub struct ContextVar(Rc<VarInner>);

impl ContextVar {
    /// Create a variable with no default value
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Create a variable with a default used when no context binds it
    pub fn with_default(name: impl Into<String>, default: Value) -> Self {
        Self::build(name.into(), Some(default))
    }

    fn build(name: String, default: Option<Value>) -> Self {
        let id = NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed);
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        name.hash(&mut hasher);
        let hash = hasher.finish() ^ id.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self(Rc::new(VarInner {
            name,
            default,
            hash,
            cached: RefCell::new(None),
        }))
    }

    /// The variable's name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The variable's default value, if any
    pub fn default(&self) -> Option<&Value> {
        self.0.default.as_ref()
    }

    /// Resolve the variable against the strand's current context
    ///
    /// Falls back to the variable's own default; fails with a lookup error
    /// when neither a binding nor a default exists.
    pub fn get(&self, strand: &mut Strand) -> Result<Value, VmError> {
        self.get_with(strand, None)
    }

    /// Resolve with an explicit fallback taking precedence over the
    /// variable's own default
    pub fn get_with(
        &self,
        strand: &mut Strand,
        default: Option<&Value>,
    ) -> Result<Value, VmError> {
        let ctx = strand.current_context();

        if let Some(cached) = self.0.cached.borrow().as_ref() {
            if cached.strand_id == strand.id() && cached.generation == strand.generation() {
                return Ok(cached.value.clone());
            }
        }

        if let Some(found) = ctx.vars.borrow().find(self) {
            let value = found.clone();
            *self.0.cached.borrow_mut() = Some(CachedRead {
                value: value.clone(),
                strand_id: strand.id(),
                generation: strand.generation(),
            });
            return Ok(value);
        }

        if let Some(fallback) = default {
            return Ok(fallback.clone());
        }
        if let Some(fallback) = &self.0.default {
            return Ok(fallback.clone());
        }
        Err(VmError::lookup_error(format!(
            "{:?} has no value in the current context",
            self
        )))
    }

    /// Bind the variable in the strand's current context
    ///
    /// Returns a one-shot [`Token`] capturing the previous binding (if any)
    /// for [`ContextVar::reset`].
    pub fn set(&self, strand: &mut Strand, value: Value) -> Token {
        let ctx = strand.current_context();
        let old_value = ctx.vars.borrow().find(self).cloned();
        let token = Token {
            ctx: Rc::clone(&ctx),
            var: self.clone(),
            old_value,
            used: Cell::new(false),
        };
        self.set_value(strand, &ctx, value);
        token
    }

    /// Restore the binding captured by `token`
    ///
    /// Fails if the token was already used, belongs to a different
    /// variable, or was created in a different context than the strand's
    /// current one.
    pub fn reset(&self, strand: &mut Strand, token: &Token) -> Result<(), VmError> {
        if token.used.get() {
            return Err(VmError::runtime_error(format!(
                "{:?} has already been used once",
                token
            )));
        }
        if token.var != *self {
            return Err(VmError::value_error(format!(
                "{:?} was created by a different ContextVar",
                token
            )));
        }
        let ctx = strand.current_context();
        if !Rc::ptr_eq(&ctx, &token.ctx) {
            return Err(VmError::value_error(format!(
                "{:?} was created in a different Context",
                token
            )));
        }

        token.used.set(true);
        match &token.old_value {
            Some(old) => {
                self.set_value(strand, &ctx, old.clone());
                Ok(())
            }
            None => self.delete_value(&ctx),
        }
    }

    fn set_value(&self, strand: &Strand, ctx: &Rc<Context>, value: Value) {
        let new_vars = ctx.vars.borrow().assoc(self.clone(), value.clone());
        *ctx.vars.borrow_mut() = new_vars;
        *self.0.cached.borrow_mut() = Some(CachedRead {
            value,
            strand_id: strand.id(),
            generation: strand.generation(),
        });
    }

    fn delete_value(&self, ctx: &Rc<Context>) -> Result<(), VmError> {
        *self.0.cached.borrow_mut() = None;
        let vars = ctx.vars.borrow().clone();
        let new_vars = vars.without(self);
        if new_vars.shares_root(&vars) {
            return Err(VmError::lookup_error(format!(
                "{:?} has no value in the current context",
                self
            )));
        }
        *ctx.vars.borrow_mut() = new_vars;
        Ok(())
    }
}

impl PartialEq for ContextVar {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContextVar {}

impl Hash for ContextVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Debug for ContextVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ContextVar name={:?}", self.0.name)?;
        if let Some(default) = &self.0.default {
            write!(f, " default={}", default)?;
        }
        write!(f, ">")
    }
}

/// A one-shot capability to undo a prior [`ContextVar::set`]
pub struct Token {
    ctx: Rc<Context>,
    var: ContextVar,
    old_value: Option<Value>,
    used: Cell<bool>,
}

impl Token {
    /// The variable the originating `set` targeted
    pub fn var(&self) -> &ContextVar {
        &self.var
    }

    /// The binding in force before the originating `set`
    ///
    /// `None` means the variable had no binding at all (the original's
    /// `Token.MISSING`).
    pub fn old_value(&self) -> Option<&Value> {
        self.old_value.as_ref()
    }

    /// Whether the token has been consumed by a reset
    pub fn is_used(&self) -> bool {
        self.used.get()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Token{} var={:?}>",
            if self.used.get() { " used" } else { "" },
            self.var
        )
    }
}

/// A coroutine's own context scope, interposed into a strand's chain while
/// the coroutine runs
///
/// State machine: detached (created, or suspended) -> active (spliced in on
/// resume, when the scope holds a base context) -> detached again on
/// suspension. Activating an already-active scope or deactivating a
/// detached one is a programming error and panics.
#[derive(Debug)]
pub struct CoroutineScope {
    link: LinkHandle,
}

impl CoroutineScope {
    /// Create a detached scope with no base context
    pub fn new() -> Self {
        Self {
            link: new_link(false),
        }
    }

    /// Whether the scope is currently spliced into a strand's chain
    pub fn is_active(&self) -> bool {
        self.link.borrow().linked
    }

    /// The context currently on top of this scope's own stack
    pub fn top_context(&self) -> Option<Rc<Context>> {
        self.link.borrow().top.clone()
    }

    /// Splice this scope in as the strand's chain head
    ///
    /// A scope with no base context has nothing to interpose and activation
    /// is a no-op.
    pub fn activate(&self, strand: &mut Strand) {
        if self.link.borrow().top.is_none() {
            return;
        }
        strand.chain.link(&self.link);
        strand.context_switched();
    }

    /// Remove this scope from the strand's chain
    pub fn deactivate(&self, strand: &mut Strand) {
        strand.chain.unlink(&self.link);
        strand.context_switched();
    }

    /// Replace the scope's base context
    ///
    /// Fails while the coroutine still has non-base contexts entered, and
    /// when the new context is already entered elsewhere. The new base is
    /// entered before the old one is exited, so a failure leaves the scope
    /// unchanged. Setting the base of an active scope to `None` removes the
    /// scope from the chain.
    pub fn reset_base(
        &self,
        strand: &mut Strand,
        ctx: Option<&Rc<Context>>,
    ) -> Result<(), VmError> {
        let old = self.link.borrow().top.clone();
        if let Some(old_ctx) = &old {
            if old_ctx.prev.borrow().is_some() {
                return Err(VmError::runtime_error(
                    "cannot reset a coroutine's base context until the coroutine has \
                     exited all of its non-base contexts",
                ));
            }
        }
        let unchanged = match (&old, ctx) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return Ok(());
        }
        if let Some(new_ctx) = ctx {
            if new_ctx.entered.get() {
                return Err(VmError::runtime_error(format!(
                    "cannot enter context: {:?} is already entered",
                    new_ctx
                )));
            }
        }

        let before = strand.active_context();
        let was_linked = self.link.borrow().linked;

        if let Some(old_ctx) = &old {
            old_ctx.entered.set(false);
            old_ctx.prev.borrow_mut().take();
        }
        match ctx {
            Some(new_ctx) => {
                new_ctx.entered.set(true);
                self.link.borrow_mut().top = Some(Rc::clone(new_ctx));
            }
            None => {
                self.link.borrow_mut().top = None;
                if was_linked {
                    strand.chain.unlink(&self.link);
                }
            }
        }

        let after = strand.active_context();
        let switched = match (&before, &after) {
            (None, None) => false,
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            _ => true,
        };
        if switched {
            strand.context_switched();
        }
        Ok(())
    }
}

impl Default for CoroutineScope {
    fn default() -> Self {
        Self::new()
    }
}
