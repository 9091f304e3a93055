//! Hierarchical cancellation scopes.
//!
//! This module provides:
//! - Aborter, a cancellation node that cascades `abort()` to its descendants
//! - Timer scheduling that aborts a node after a fixed delay
//! - Key/value bindings resolved through the ancestor chain

mod node;
mod timer;

pub use node::{AbortCallback, Aborter, ListenerId};
