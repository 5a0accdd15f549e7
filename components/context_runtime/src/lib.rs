//! Context-variable engine for the bytecode runtime.
//!
//! This crate provides coroutine-safe dynamic scoping:
//!
//! - A persistent, structurally shared map ([`Hamt`]) backing every
//!   context's variable bindings
//! - [`Context`] / [`ContextVar`] / [`Token`]: enter/exit semantics,
//!   copy-on-write snapshots, and token-based rollback
//! - A per-strand chain of active contexts ([`ContextChain`]) with O(1)
//!   splicing when a suspended coroutine resumes ([`CoroutineScope`])
//! - A watcher registry notified on every context switch
//!   ([`ContextRuntime`])
//!
//! # Example
//!
//! ```
//! use context_runtime::{ContextRuntime, ContextVar, Strand};
//! use core_types::Value;
//!
//! let runtime = ContextRuntime::new();
//! let mut strand = Strand::new(&runtime);
//! let var = ContextVar::new("request_id");
//!
//! let token = var.set(&mut strand, Value::int(7));
//! assert_eq!(var.get(&mut strand).unwrap(), Value::int(7));
//!
//! var.reset(&mut strand, &token).unwrap();
//! assert!(var.get(&mut strand).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod context;
pub mod hamt;

// Re-export main types at crate root
pub use chain::ContextChain;
pub use context::{
    Context, ContextEvent, ContextRuntime, ContextVar, CoroutineScope, Strand, Token,
    WatchCallback, MAX_CONTEXT_WATCHERS,
};
pub use hamt::Hamt;
