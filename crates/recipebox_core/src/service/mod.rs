//! Consistency engine and its supporting rules.
//!
//! # Responsibility
//! - Sequence every mutation that crosses the account/recipe boundary.
//! - Map store failures to the stable error kinds callers branch on.
//!
//! # Invariants
//! - The engine is the only component that talks to both stores.
//! - The engine holds no locks of its own; same-record serialization comes
//!   from the store's atomic primitives.

pub mod consistency_engine;
pub mod error;
pub mod ownership;
