//! Consistency engine over the account and recipe stores.
//!
//! # Responsibility
//! - Expose one entry point per account/recipe/favorite use case.
//! - Run the recipe and account delete cascades in a fixed step order.
//! - Toggle favorites through the store's atomic primitive.
//! - Drop favorite references to vanished recipes when they are next read.
//!
//! # Invariants
//! - Existence is checked before ownership; `NotFound` is never reported as
//!   `Forbidden` or the other way round.
//! - A recipe row is removed before its id is swept from favorites.
//! - An account's recipes are removed before the account row.
//! - Cascades are idempotent; an interrupted one is finished by running it
//!   again, never rolled back.
//! - The engine never retries a failed store call.

use crate::logging::sanitize_message;
use crate::model::account::{
    Account, AccountId, AccountPatch, AccountValidationError, FavoriteToggle, NewAccount,
};
use crate::model::recipe::{NewRecipe, Recipe, RecipeId, RecipePatch};
use crate::repo::account_repo::AccountRepository;
use crate::repo::recipe_repo::{RecipeListQuery, RecipeRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::error::{EngineError, EngineResult, ErrorKind, ForbiddenReason};
use crate::service::ownership::{ensure_owner, Requester};
use log::{debug, error, info, warn};
use std::time::Instant;

/// Owned-recipe listings re-checked during one account delete. Covers
/// recipes created by requests that passed the pending check just before the
/// account was flagged.
const MAX_CASCADE_PASSES: usize = 3;
const MAX_LOGGED_ERROR_CHARS: usize = 240;

/// Summary of a completed recipe delete cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeDeletion {
    pub recipe_id: RecipeId,
    /// Accounts whose favorites referenced the recipe.
    pub favorites_removed: usize,
}

/// Summary of a completed account delete cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDeletion {
    pub account_id: AccountId,
    pub recipes_deleted: usize,
    pub favorites_removed: usize,
}

#[derive(Debug, Clone, Copy)]
struct CascadeOutcome {
    recipe_deleted: bool,
    favorites_removed: usize,
}

/// Coordinates every mutation that touches both accounts and recipes.
pub struct ConsistencyEngine<A: AccountRepository, R: RecipeRepository> {
    accounts: A,
    recipes: R,
}

impl<A: AccountRepository, R: RecipeRepository> ConsistencyEngine<A, R> {
    /// Creates an engine over the two store implementations.
    pub fn new(accounts: A, recipes: R) -> Self {
        Self { accounts, recipes }
    }

    /// Registers an account.
    ///
    /// Fails with `DuplicateIdentity` when username or email is taken.
    pub fn create_account(&self, input: NewAccount) -> EngineResult<Account> {
        let started_at = Instant::now();
        let result = self.create_account_inner(input);
        finish("account_create", started_at, result)
    }

    /// Loads an account, dropping favorites whose recipe no longer exists.
    pub fn get_account(&self, account_id: AccountId) -> EngineResult<Account> {
        let started_at = Instant::now();
        let result = self.get_account_inner(account_id);
        finish("account_get", started_at, result)
    }

    /// Looks up the account a login attempt refers to.
    ///
    /// Credential verification belongs to the caller, which receives the
    /// stored `credential_hash`.
    pub fn authenticate_by_identifier(&self, identifier: &str) -> EngineResult<Account> {
        let started_at = Instant::now();
        let result = self.authenticate_by_identifier_inner(identifier);
        finish("account_authenticate", started_at, result)
    }

    /// Applies a profile edit. An empty patch writes nothing.
    pub fn update_account(
        &self,
        account_id: AccountId,
        patch: AccountPatch,
    ) -> EngineResult<Account> {
        let started_at = Instant::now();
        let result = self.update_account_inner(account_id, patch);
        finish("account_update", started_at, result)
    }

    /// Deletes an account and every recipe it owns.
    ///
    /// # Cascade order
    /// 1. Flag the account `deletion_pending` (blocks new recipes for it).
    /// 2. For each owned recipe: delete the recipe, then sweep its id from
    ///    all favorites.
    /// 3. Delete the account row.
    ///
    /// A failure part-way leaves the account flagged; calling this again, or
    /// `resume_pending_deletions`, finishes the job.
    pub fn delete_account(&self, account_id: AccountId) -> EngineResult<AccountDeletion> {
        let started_at = Instant::now();
        let result = self.delete_account_inner(account_id);
        finish("account_delete", started_at, result)
    }

    /// Finishes every account delete that was interrupted part-way.
    ///
    /// Accounts that disappear while this runs are skipped.
    pub fn resume_pending_deletions(&self) -> EngineResult<Vec<AccountDeletion>> {
        let pending = self.accounts.list_pending_deletions()?;
        let mut completed = Vec::with_capacity(pending.len());
        for account_id in pending {
            match self.delete_account(account_id) {
                Ok(deletion) => completed.push(deletion),
                Err(EngineError::AccountNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        if !completed.is_empty() {
            info!(
                "event=account_delete_resume module=engine status=ok completed={}",
                completed.len()
            );
        }
        Ok(completed)
    }

    /// Creates a recipe authored by `requester`.
    pub fn create_recipe(&self, input: NewRecipe, requester: Requester) -> EngineResult<Recipe> {
        let started_at = Instant::now();
        let result = self.create_recipe_inner(input, requester);
        finish("recipe_create", started_at, result)
    }

    /// Loads one recipe.
    pub fn get_recipe(&self, recipe_id: RecipeId) -> EngineResult<Recipe> {
        self.require_recipe(recipe_id)
    }

    /// Lists every recipe.
    pub fn list_all_recipes(&self) -> EngineResult<Vec<Recipe>> {
        self.recipes.list_all().map_err(Into::into)
    }

    /// Lists recipes authored by `requester`.
    pub fn list_my_recipes(&self, requester: Requester) -> EngineResult<Vec<Recipe>> {
        let owner_id = requester.ok_or(ForbiddenReason::Anonymous)?;
        self.recipes.list_by_owner(owner_id).map_err(Into::into)
    }

    /// Lists recipes by title substring and/or category.
    ///
    /// Blank filters are ignored.
    pub fn search_recipes(&self, query: &RecipeListQuery) -> EngineResult<Vec<Recipe>> {
        let normalized = RecipeListQuery {
            owner_id: query.owner_id,
            category: normalize_filter(query.category.as_deref()),
            title_contains: normalize_filter(query.title_contains.as_deref()),
            limit: query.limit,
            offset: query.offset,
        };
        self.recipes.list_recipes(&normalized).map_err(Into::into)
    }

    /// Edits a recipe. Only its owner may do so; an empty patch writes nothing.
    pub fn update_recipe(
        &self,
        recipe_id: RecipeId,
        patch: RecipePatch,
        requester: Requester,
    ) -> EngineResult<Recipe> {
        let started_at = Instant::now();
        let result = self.update_recipe_inner(recipe_id, patch, requester);
        finish("recipe_update", started_at, result)
    }

    /// Deletes a recipe and removes it from every account's favorites.
    ///
    /// The two steps are ordered, not transactional. If the sweep fails after
    /// the recipe is gone, the leftover references are dropped by lazy repair
    /// or `repair_dangling_favorites`.
    pub fn delete_recipe(
        &self,
        recipe_id: RecipeId,
        requester: Requester,
    ) -> EngineResult<RecipeDeletion> {
        let started_at = Instant::now();
        let result = self.delete_recipe_inner(recipe_id, requester);
        finish("recipe_delete", started_at, result)
    }

    /// Adds `recipe_id` to the account's favorites, or removes it if present.
    ///
    /// The recipe must exist. The flip itself is one atomic store operation,
    /// so concurrent toggles never produce duplicates or lost updates. Once
    /// the flip is committed this never reports an error; a failed repair of
    /// other favorites is logged and left for the next read. A blind retry
    /// after a timeout may still flip twice; callers that retry should
    /// re-read the account first.
    pub fn toggle_favorite(
        &self,
        account_id: AccountId,
        recipe_id: RecipeId,
    ) -> EngineResult<FavoriteToggle> {
        let started_at = Instant::now();
        let result = self.toggle_favorite_inner(account_id, recipe_id);
        finish("favorite_toggle", started_at, result)
    }

    /// Lists the recipes an account has favorited, in the order they were
    /// added.
    pub fn list_favorites(&self, account_id: AccountId) -> EngineResult<Vec<Recipe>> {
        let account = self.get_account(account_id)?;
        let mut favorites = Vec::with_capacity(account.favorite_recipe_ids.len());
        for recipe_id in account.favorite_recipe_ids {
            // Deleted between repair and this read; the next read repairs it.
            if let Some(recipe) = self.recipes.get_recipe(recipe_id)? {
                favorites.push(recipe);
            }
        }
        Ok(favorites)
    }

    /// Removes every favorite reference whose recipe no longer exists.
    ///
    /// Returns the number of favorite entries removed.
    pub fn repair_dangling_favorites(&self) -> EngineResult<usize> {
        let started_at = Instant::now();
        let result = self.repair_dangling_favorites_inner();
        finish("favorite_repair_all", started_at, result)
    }

    fn create_account_inner(&self, input: NewAccount) -> EngineResult<Account> {
        let input = input.normalized()?;
        let account = self.accounts.create_account(&input)?;
        info!(
            "event=account_create module=engine status=ok account_id={}",
            account.id
        );
        Ok(account)
    }

    fn get_account_inner(&self, account_id: AccountId) -> EngineResult<Account> {
        let mut account = self.require_account(account_id)?;
        self.repair_favorites(account_id, &mut account.favorite_recipe_ids)?;
        Ok(account)
    }

    fn authenticate_by_identifier_inner(&self, identifier: &str) -> EngineResult<Account> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AccountValidationError::EmptyIdentifier.into());
        }
        let mut account = self
            .accounts
            .find_account_by_identifier(identifier)?
            .ok_or(EngineError::IdentifierNotFound)?;
        self.repair_favorites(account.id, &mut account.favorite_recipe_ids)?;
        Ok(account)
    }

    fn update_account_inner(
        &self,
        account_id: AccountId,
        patch: AccountPatch,
    ) -> EngineResult<Account> {
        let patch = patch.normalized()?;
        if patch.is_empty() {
            return self.get_account_inner(account_id);
        }

        let mut account = self.accounts.update_account(account_id, &patch)?;
        self.repair_after_write(account_id, &mut account.favorite_recipe_ids);
        info!(
            "event=account_update module=engine status=ok account_id={}",
            account_id
        );
        Ok(account)
    }

    fn delete_account_inner(&self, account_id: AccountId) -> EngineResult<AccountDeletion> {
        let account = self.require_account(account_id)?;
        if !account.deletion_pending {
            self.accounts.mark_deletion_pending(account_id)?;
        }
        info!(
            "event=account_delete module=engine status=start account_id={} resumed={}",
            account_id, account.deletion_pending
        );

        let mut deletion = AccountDeletion {
            account_id,
            recipes_deleted: 0,
            favorites_removed: 0,
        };
        for _ in 0..MAX_CASCADE_PASSES {
            let owned = self.recipes.list_by_owner(account_id)?;
            if owned.is_empty() {
                break;
            }
            for recipe in owned {
                let outcome = self.cascade_recipe_delete(recipe.id)?;
                if outcome.recipe_deleted {
                    deletion.recipes_deleted += 1;
                }
                deletion.favorites_removed += outcome.favorites_removed;
            }
        }

        self.accounts.delete_account(account_id)?;
        info!(
            "event=account_delete module=engine status=ok account_id={} recipes_deleted={} favorites_removed={}",
            account_id, deletion.recipes_deleted, deletion.favorites_removed
        );
        Ok(deletion)
    }

    fn create_recipe_inner(&self, input: NewRecipe, requester: Requester) -> EngineResult<Recipe> {
        let owner_id = requester.ok_or(ForbiddenReason::Anonymous)?;
        let owner = self.require_account(owner_id)?;
        if owner.deletion_pending {
            return Err(ForbiddenReason::DeletionPending(owner_id).into());
        }

        let fields = input.into_fields()?;
        let recipe = self.recipes.create_recipe(&fields, owner_id)?;
        info!(
            "event=recipe_create module=engine status=ok recipe_id={} owner_id={}",
            recipe.id, owner_id
        );
        Ok(recipe)
    }

    fn update_recipe_inner(
        &self,
        recipe_id: RecipeId,
        patch: RecipePatch,
        requester: Requester,
    ) -> EngineResult<Recipe> {
        let recipe = self.require_recipe(recipe_id)?;
        ensure_owner(requester, &recipe)?;

        let changes = patch.into_changes()?;
        if changes.is_empty() {
            return Ok(recipe);
        }

        let updated = self.recipes.update_recipe(recipe_id, &changes)?;
        info!(
            "event=recipe_update module=engine status=ok recipe_id={}",
            recipe_id
        );
        Ok(updated)
    }

    fn delete_recipe_inner(
        &self,
        recipe_id: RecipeId,
        requester: Requester,
    ) -> EngineResult<RecipeDeletion> {
        let recipe = self.require_recipe(recipe_id)?;
        ensure_owner(requester, &recipe)?;

        let outcome = self.cascade_recipe_delete(recipe_id)?;
        if !outcome.recipe_deleted {
            return Err(EngineError::RecipeNotFound(recipe_id));
        }
        info!(
            "event=recipe_delete module=engine status=ok recipe_id={} favorites_removed={}",
            recipe_id, outcome.favorites_removed
        );
        Ok(RecipeDeletion {
            recipe_id,
            favorites_removed: outcome.favorites_removed,
        })
    }

    fn toggle_favorite_inner(
        &self,
        account_id: AccountId,
        recipe_id: RecipeId,
    ) -> EngineResult<FavoriteToggle> {
        self.require_recipe(recipe_id)?;
        let mut toggle = self
            .accounts
            .toggle_favorite_for_account(account_id, recipe_id)?;
        self.repair_after_write(account_id, &mut toggle.favorite_recipe_ids);
        debug!(
            "event=favorite_toggle module=engine status=ok account_id={} recipe_id={} state={:?}",
            account_id, recipe_id, toggle.state
        );
        Ok(toggle)
    }

    fn repair_dangling_favorites_inner(&self) -> EngineResult<usize> {
        let referenced = self.accounts.favorited_recipe_ids()?;
        let existing = self.recipes.existing_ids(&referenced)?;
        let mut removed = 0;
        for recipe_id in referenced {
            if existing.contains(&recipe_id) {
                continue;
            }
            removed += self.accounts.remove_favorite_everywhere(recipe_id)?;
        }
        if removed > 0 {
            warn!(
                "event=favorite_repair module=engine status=ok scope=all removed={}",
                removed
            );
        }
        Ok(removed)
    }

    fn require_account(&self, account_id: AccountId) -> EngineResult<Account> {
        self.accounts
            .get_account(account_id)?
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    fn require_recipe(&self, recipe_id: RecipeId) -> EngineResult<Recipe> {
        self.recipes
            .get_recipe(recipe_id)?
            .ok_or(EngineError::RecipeNotFound(recipe_id))
    }

    /// Recipe delete followed by the favorites sweep. The sweep runs even when
    /// the recipe row is already gone, which makes re-runs finish the job.
    fn cascade_recipe_delete(&self, recipe_id: RecipeId) -> RepoResult<CascadeOutcome> {
        let recipe_deleted = match self.recipes.delete_recipe(recipe_id) {
            Ok(()) => true,
            Err(RepoError::RecipeNotFound(_)) => false,
            Err(err) => return Err(err),
        };
        let favorites_removed = self.accounts.remove_favorite_everywhere(recipe_id)?;
        Ok(CascadeOutcome {
            recipe_deleted,
            favorites_removed,
        })
    }

    /// Lazy repair on read: pulls favorites whose recipe has vanished and
    /// drops them from `favorite_ids`.
    fn repair_favorites(
        &self,
        account_id: AccountId,
        favorite_ids: &mut Vec<RecipeId>,
    ) -> EngineResult<usize> {
        if favorite_ids.is_empty() {
            return Ok(0);
        }

        let existing = self.recipes.existing_ids(favorite_ids)?;
        let dangling: Vec<RecipeId> = favorite_ids
            .iter()
            .copied()
            .filter(|recipe_id| !existing.contains(recipe_id))
            .collect();
        for recipe_id in &dangling {
            self.accounts
                .pull_favorite_for_account(account_id, *recipe_id)?;
            warn!(
                "event=favorite_repair module=engine status=ok account_id={} recipe_id={}",
                account_id, recipe_id
            );
        }
        favorite_ids.retain(|recipe_id| existing.contains(recipe_id));
        Ok(dangling.len())
    }

    /// Lazy repair after a committed write. The write already happened, so a
    /// repair failure is logged and the ids are returned unrepaired.
    fn repair_after_write(&self, account_id: AccountId, favorite_ids: &mut Vec<RecipeId>) {
        if let Err(err) = self.repair_favorites(account_id, favorite_ids) {
            warn!(
                "event=favorite_repair module=engine status=error account_id={} error_code={} error={}",
                account_id,
                err.kind(),
                error_summary(&err)
            );
        }
    }
}

fn normalize_filter(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Logs the terminal status of one engine operation.
///
/// Expected outcomes stay at `debug`; only store failures are faults.
fn finish<T>(event: &'static str, started_at: Instant, result: EngineResult<T>) -> EngineResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!(
            "event={} module=engine status=ok duration_ms={}",
            event, duration_ms
        ),
        Err(err) if err.kind() == ErrorKind::StoreUnavailable => error!(
            "event={} module=engine status=error duration_ms={} error_code={} error={}",
            event,
            duration_ms,
            err.kind(),
            error_summary(err)
        ),
        Err(err) => debug!(
            "event={} module=engine status=rejected duration_ms={} error_code={}",
            event,
            duration_ms,
            err.kind()
        ),
    }
    result
}

/// Store errors can echo whole SQL statements; keep log lines short.
fn error_summary(err: &EngineError) -> String {
    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
}
