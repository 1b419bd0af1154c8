//! Core domain logic for RecipeBox.
//! This crate owns the referential-integrity rules between accounts, recipes
//! and favorites.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::account::{
    Account, AccountId, AccountPatch, AccountValidationError, FavoriteState, FavoriteToggle,
    NewAccount,
};
pub use model::recipe::{
    split_ingredients, IngredientsInput, NewRecipe, Recipe, RecipeChanges, RecipeFields, RecipeId,
    RecipePatch, RecipeValidationError,
};
pub use repo::account_repo::{AccountRepository, SqliteAccountRepository};
pub use repo::recipe_repo::{RecipeListQuery, RecipeRepository, SqliteRecipeRepository};
pub use repo::{IdentityField, RepoError, RepoResult};
pub use service::consistency_engine::{AccountDeletion, ConsistencyEngine, RecipeDeletion};
pub use service::error::{EngineError, EngineResult, ErrorKind, ForbiddenReason};
pub use service::ownership::{ensure_owner, is_owner, Requester};

/// Engine over the SQLite stores sharing one connection.
pub type SqliteEngine<'conn> =
    ConsistencyEngine<SqliteAccountRepository<'conn>, SqliteRecipeRepository<'conn>>;

/// Builds an engine whose stores share `conn`.
///
/// Fails when the connection has not been migrated to the current schema.
pub fn sqlite_engine(conn: &rusqlite::Connection) -> RepoResult<SqliteEngine<'_>> {
    Ok(ConsistencyEngine::new(
        SqliteAccountRepository::try_new(conn)?,
        SqliteRecipeRepository::try_new(conn)?,
    ))
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
