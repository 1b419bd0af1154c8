//! Store layer: account and recipe persistence contracts.
//!
//! # Responsibility
//! - Define the two leaf store contracts the consistency engine consumes.
//! - Keep SQLite query details out of the engine.
//!
//! # Invariants
//! - Neither store reads or writes the other store's tables.
//! - Write paths validate input before SQL mutations.
//! - Store APIs return semantic errors (`*NotFound`, `Duplicate`) in addition
//!   to DB transport errors.

pub mod account_repo;
mod error;
pub mod recipe_repo;
mod sqlite_support;

pub use error::{IdentityField, RepoError, RepoResult};
