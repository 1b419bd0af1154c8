//! Engine error type and the stable error kinds exposed to callers.
//!
//! # Invariants
//! - Every engine failure maps to exactly one `ErrorKind`.
//! - Only `ErrorKind::StoreUnavailable` is eligible for caller-directed retry.

use crate::model::account::{AccountId, AccountValidationError};
use crate::model::recipe::{RecipeId, RecipeValidationError};
use crate::repo::{IdentityField, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Stable, enumerable failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    DuplicateIdentity,
    ValidationFailed,
    StoreUnavailable,
}

impl ErrorKind {
    /// Stable snake_case code for logs and transport mapping.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::DuplicateIdentity => "duplicate_identity",
            Self::ValidationFailed => "validation_failed",
            Self::StoreUnavailable => "store_unavailable",
        }
    }

    /// Whether a caller may retry the same request.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// Operation requires an authenticated caller.
    Anonymous,
    /// Caller does not own the target recipe.
    NotOwner {
        account_id: AccountId,
        recipe_id: RecipeId,
    },
    /// Account is being deleted and may not author new recipes.
    DeletionPending(AccountId),
}

impl Display for ForbiddenReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "an authenticated account is required"),
            Self::NotOwner {
                account_id,
                recipe_id,
            } => write!(f, "account {account_id} does not own recipe {recipe_id}"),
            Self::DeletionPending(account_id) => {
                write!(f, "account {account_id} is being deleted")
            }
        }
    }
}

/// Errors returned by `ConsistencyEngine` operations.
#[derive(Debug)]
pub enum EngineError {
    /// Referenced account does not exist.
    AccountNotFound(AccountId),
    /// No account matches the supplied username or email.
    IdentifierNotFound,
    /// Referenced recipe does not exist.
    RecipeNotFound(RecipeId),
    /// Ownership or authentication check failed.
    Forbidden(ForbiddenReason),
    /// Username or email already belongs to another account.
    DuplicateIdentity(IdentityField),
    /// Account input is missing or malformed.
    InvalidAccount(AccountValidationError),
    /// Recipe input is missing or malformed.
    InvalidRecipe(RecipeValidationError),
    /// Underlying store failed for infrastructural reasons.
    StoreUnavailable(RepoError),
}

impl EngineError {
    /// Stable kind callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_) | Self::IdentifierNotFound | Self::RecipeNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
            Self::InvalidAccount(_) | Self::InvalidRecipe(_) => ErrorKind::ValidationFailed,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountNotFound(id) => write!(f, "account not found: {id}"),
            Self::IdentifierNotFound => write!(f, "no account matches the identifier"),
            Self::RecipeNotFound(id) => write!(f, "recipe not found: {id}"),
            Self::Forbidden(reason) => write!(f, "forbidden: {reason}"),
            Self::DuplicateIdentity(field) => write!(f, "{field} is already in use"),
            Self::InvalidAccount(err) => write!(f, "{err}"),
            Self::InvalidRecipe(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAccount(err) => Some(err),
            Self::InvalidRecipe(err) => Some(err),
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ForbiddenReason> for EngineError {
    fn from(value: ForbiddenReason) -> Self {
        Self::Forbidden(value)
    }
}

impl From<AccountValidationError> for EngineError {
    fn from(value: AccountValidationError) -> Self {
        Self::InvalidAccount(value)
    }
}

impl From<RecipeValidationError> for EngineError {
    fn from(value: RecipeValidationError) -> Self {
        Self::InvalidRecipe(value)
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::AccountNotFound(id) | RepoError::MissingOwner(id) => {
                Self::AccountNotFound(id)
            }
            RepoError::RecipeNotFound(id) => Self::RecipeNotFound(id),
            RepoError::Duplicate(field) => Self::DuplicateIdentity(field),
            RepoError::AccountValidation(err) => Self::InvalidAccount(err),
            RepoError::RecipeValidation(err) => Self::InvalidRecipe(err),
            other => Self::StoreUnavailable(other),
        }
    }
}
