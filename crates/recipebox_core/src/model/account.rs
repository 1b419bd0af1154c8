//! Account domain model.
//!
//! # Responsibility
//! - Define the registered identity record and its favorites set.
//! - Normalize registration and profile-edit input.
//!
//! # Invariants
//! - `username` and `email` are trimmed and non-empty.
//! - `favorite_recipe_ids` holds each recipe id at most once.
//! - `credential_hash` is opaque; this crate stores it but never interprets it.

use crate::model::recipe::RecipeId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a registered account.
pub type AccountId = Uuid;

static EMAIL_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("valid email regex"));

/// Registered user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable account id.
    pub id: AccountId,
    /// Unique (case-insensitive) display handle.
    pub username: String,
    /// Unique (case-insensitive) email address.
    pub email: String,
    /// Owned by the authentication collaborator; never serialized outward.
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    /// Favorited recipe ids in the order they were added.
    pub favorite_recipe_ids: Vec<RecipeId>,
    /// Set while an account delete cascade is in flight.
    pub deletion_pending: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Account {
    /// Returns whether `recipe_id` is currently in this account's favorites.
    pub fn has_favorite(&self, recipe_id: RecipeId) -> bool {
        self.favorite_recipe_ids.contains(&recipe_id)
    }
}

/// Membership of a recipe in an account's favorites after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteState {
    Added,
    Removed,
}

/// Outcome of one atomic favorite toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteToggle {
    pub recipe_id: RecipeId,
    pub state: FavoriteState,
    /// Favorites set after the toggle was applied.
    pub favorite_recipe_ids: Vec<RecipeId>,
}

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub credential_hash: String,
}

impl NewAccount {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        credential_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            credential_hash: credential_hash.into(),
        }
    }

    /// Trims identity fields and validates the result.
    pub fn normalized(self) -> Result<Self, AccountValidationError> {
        let normalized = Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            credential_hash: self.credential_hash,
        };
        normalized.validate()?;
        Ok(normalized)
    }

    /// Validates required fields without modifying them.
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_credential_hash(&self.credential_hash)
    }
}

/// Partial profile edit. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub credential_hash: Option<String>,
}

impl AccountPatch {
    /// Returns whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.credential_hash.is_none()
    }

    /// Trims provided identity fields and validates them.
    pub fn normalized(self) -> Result<Self, AccountValidationError> {
        let normalized = Self {
            username: self.username.map(|value| value.trim().to_string()),
            email: self.email.map(|value| value.trim().to_string()),
            credential_hash: self.credential_hash,
        };
        normalized.validate()?;
        Ok(normalized)
    }

    /// Validates provided fields without modifying them.
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(credential_hash) = &self.credential_hash {
            validate_credential_hash(credential_hash)?;
        }
        Ok(())
    }
}

/// Validation failures for account input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyUsername,
    EmptyEmail,
    MalformedEmail,
    EmptyCredentialHash,
    EmptyIdentifier,
}

impl Display for AccountValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username must not be blank"),
            Self::EmptyEmail => write!(f, "email must not be blank"),
            Self::MalformedEmail => write!(f, "email must look like `name@domain`"),
            Self::EmptyCredentialHash => write!(f, "credential hash must not be empty"),
            Self::EmptyIdentifier => write!(f, "username or email must not be blank"),
        }
    }
}

impl Error for AccountValidationError {}

fn validate_username(value: &str) -> Result<(), AccountValidationError> {
    if value.trim().is_empty() {
        return Err(AccountValidationError::EmptyUsername);
    }
    Ok(())
}

fn validate_email(value: &str) -> Result<(), AccountValidationError> {
    if value.trim().is_empty() {
        return Err(AccountValidationError::EmptyEmail);
    }
    if !EMAIL_SHAPE_RE.is_match(value.trim()) {
        return Err(AccountValidationError::MalformedEmail);
    }
    Ok(())
}

fn validate_credential_hash(value: &str) -> Result<(), AccountValidationError> {
    if value.is_empty() {
        return Err(AccountValidationError::EmptyCredentialHash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AccountPatch, AccountValidationError, NewAccount};

    #[test]
    fn normalized_trims_identity_fields() {
        let account = NewAccount::new("  alice ", " alice@example.com ", "hash")
            .normalized()
            .expect("valid account input");
        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "alice@example.com");
    }

    #[test]
    fn normalized_rejects_blank_and_malformed_fields() {
        let err = NewAccount::new("   ", "a@b", "hash").normalized().unwrap_err();
        assert_eq!(err, AccountValidationError::EmptyUsername);

        let err = NewAccount::new("alice", "not-an-email", "hash")
            .normalized()
            .unwrap_err();
        assert_eq!(err, AccountValidationError::MalformedEmail);

        let err = NewAccount::new("alice", "a@b", "").normalized().unwrap_err();
        assert_eq!(err, AccountValidationError::EmptyCredentialHash);
    }

    #[test]
    fn patch_only_validates_provided_fields() {
        let patch = AccountPatch {
            email: Some(" new@example.com ".to_string()),
            ..AccountPatch::default()
        }
        .normalized()
        .expect("email-only patch is valid");
        assert_eq!(patch.email.as_deref(), Some("new@example.com"));
        assert!(patch.username.is_none());

        let err = AccountPatch {
            username: Some(" ".to_string()),
            ..AccountPatch::default()
        }
        .normalized()
        .unwrap_err();
        assert_eq!(err, AccountValidationError::EmptyUsername);
    }
}
