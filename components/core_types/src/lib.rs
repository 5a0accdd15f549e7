//! Core runtime value types and error handling.
//!
//! This crate provides the foundational types for the bytecode runtime:
//! value representation, identity-compared type objects, and error types.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of runtime values
//! - [`TypeRef`] / [`TypeRegistry`] - Opaque type objects with identity comparison
//! - [`VmError`] / [`ErrorKind`] - Runtime errors with a kind and message
//!
//! # Examples
//!
//! ```
//! use core_types::{Value, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let val = Value::int(42);
//!
//! assert!(val.is_truthy());
//! assert_eq!(registry.type_of(&val), registry.int_type);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod types;
mod value;

pub use error::{ErrorKind, VmError};
pub use types::{TypeRef, TypeRegistry};
pub use value::Value;
