//! Shared store error type.

use crate::db::DbError;
use crate::model::account::{AccountId, AccountValidationError};
use crate::model::recipe::{RecipeId, RecipeValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Unique account field involved in a constraint clash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityField {
    Username,
    Email,
}

impl IdentityField {
    /// Stable field name, matching the column name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }
}

impl Display for IdentityField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from account and recipe store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Account input failed validation.
    AccountValidation(AccountValidationError),
    /// Recipe input failed validation.
    RecipeValidation(RecipeValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target account does not exist.
    AccountNotFound(AccountId),
    /// Target recipe does not exist.
    RecipeNotFound(RecipeId),
    /// Unique `username` or `email` clash.
    Duplicate(IdentityField),
    /// Recipe insert referenced an owner row that does not exist.
    MissingOwner(AccountId),
    /// Account row is still referenced by recipes and cannot be removed.
    StillOwnsRecipes(AccountId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountValidation(err) => write!(f, "{err}"),
            Self::RecipeValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::AccountNotFound(id) => write!(f, "account not found: {id}"),
            Self::RecipeNotFound(id) => write!(f, "recipe not found: {id}"),
            Self::Duplicate(field) => write!(f, "{field} is already in use"),
            Self::MissingOwner(id) => write!(f, "recipe owner does not exist: {id}"),
            Self::StillOwnsRecipes(id) => {
                write!(f, "account {id} still owns recipes and cannot be removed")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "store requires table `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AccountValidation(err) => Some(err),
            Self::RecipeValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccountValidationError> for RepoError {
    fn from(value: AccountValidationError) -> Self {
        Self::AccountValidation(value)
    }
}

impl From<RecipeValidationError> for RepoError {
    fn from(value: RecipeValidationError) -> Self {
        Self::RecipeValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
