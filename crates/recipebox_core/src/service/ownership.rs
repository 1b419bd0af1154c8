//! Recipe ownership rule.
//!
//! The only authorization rule in the core. Callers must confirm the recipe
//! exists before evaluating it so that "not found" and "forbidden" stay
//! distinct outcomes.

use crate::model::account::AccountId;
use crate::model::recipe::Recipe;
use crate::service::error::ForbiddenReason;

/// Verified caller identity. `None` is an anonymous caller.
pub type Requester = Option<AccountId>;

/// Returns whether `requester` is the account that authored the recipe.
pub fn is_owner(requester: Requester, owner_id: AccountId) -> bool {
    requester == Some(owner_id)
}

/// Fails unless `requester` owns `recipe`.
pub fn ensure_owner(requester: Requester, recipe: &Recipe) -> Result<(), ForbiddenReason> {
    match requester {
        None => Err(ForbiddenReason::Anonymous),
        Some(account_id) if account_id == recipe.owner_id => Ok(()),
        Some(account_id) => Err(ForbiddenReason::NotOwner {
            account_id,
            recipe_id: recipe.id,
        }),
    }
}
