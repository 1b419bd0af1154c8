//! Domain model for accounts, recipes and the favorite relation.
//!
//! # Responsibility
//! - Define canonical records handed across the store/engine boundary.
//! - Normalize and validate caller input before it reaches persistence.
//!
//! # Invariants
//! - Accounts and recipes live in independent tables keyed by stable ids.
//! - Every cross reference (`owner_id`, `favorite_recipe_ids`) is an id, never
//!   an embedded record.

pub mod account;
pub mod recipe;
