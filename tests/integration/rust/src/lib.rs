//! Cross-component integration tests for the runtime core.
//!
//! The tests live under `tests/`; this library crate exists so the test
//! package is a regular workspace member.
