//! Shared lifecycle test helpers.
//!
//! Provides a temporary test tree builder and scripted collaborators that
//! record every call in a shared log, so scenarios can assert on invocation
//! order across units.

pub mod tree;
