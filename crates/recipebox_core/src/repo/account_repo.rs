//! Account store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist account identity rows and each account's favorites set.
//! - Provide the atomic favorites primitives the engine relies on.
//!
//! # Invariants
//! - `username`/`email` uniqueness is enforced by unique indexes, never by a
//!   read-then-insert check.
//! - Favorites are a `(account_uuid, recipe_uuid)` primary-keyed set, so a
//!   recipe id appears at most once per account.
//! - Favorites mutations run as single statements or inside one `IMMEDIATE`
//!   transaction; callers never write back a cached copy of the set.
//! - This store never reads the recipe tables.

use crate::model::account::{
    Account, AccountId, AccountPatch, AccountValidationError, FavoriteState, FavoriteToggle,
    NewAccount,
};
use crate::model::recipe::RecipeId;
use crate::repo::sqlite_support::{
    duplicate_identity_field, ensure_connection_ready, is_foreign_key_violation, parse_bool,
    parse_uuid,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const ACCOUNT_SELECT_SQL: &str = "SELECT
    uuid,
    username,
    email,
    credential_hash,
    deletion_pending,
    created_at,
    updated_at
FROM accounts";

/// Store interface for accounts and their favorites sets.
pub trait AccountRepository {
    /// Inserts a new account. Fails with `Duplicate` on a username/email clash.
    fn create_account(&self, account: &NewAccount) -> RepoResult<Account>;
    /// Loads one account with its favorites.
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    /// Loads the account whose username or email equals `identifier`
    /// (case-insensitive). A username match wins over an email match.
    fn find_account_by_identifier(&self, identifier: &str) -> RepoResult<Option<Account>>;
    /// Applies provided patch fields.
    fn update_account(&self, id: AccountId, patch: &AccountPatch) -> RepoResult<Account>;
    /// Removes the account row together with its own favorites set.
    fn delete_account(&self, id: AccountId) -> RepoResult<()>;
    /// Removes `recipe_id` from every favorites set. Returns accounts affected.
    fn remove_favorite_everywhere(&self, recipe_id: RecipeId) -> RepoResult<usize>;
    /// Removes `recipe_id` from one account's favorites, if present.
    fn pull_favorite_for_account(&self, id: AccountId, recipe_id: RecipeId)
        -> RepoResult<Account>;
    /// Adds `recipe_id` to one account's favorites, if absent.
    fn push_favorite_for_account(&self, id: AccountId, recipe_id: RecipeId)
        -> RepoResult<Account>;
    /// Removes `recipe_id` if present, adds it otherwise, in one transaction.
    fn toggle_favorite_for_account(
        &self,
        id: AccountId,
        recipe_id: RecipeId,
    ) -> RepoResult<FavoriteToggle>;
    /// Flags an account whose delete cascade has started.
    fn mark_deletion_pending(&self, id: AccountId) -> RepoResult<()>;
    /// Lists accounts flagged by `mark_deletion_pending`.
    fn list_pending_deletions(&self) -> RepoResult<Vec<AccountId>>;
    /// Lists every account in registration order.
    fn list_accounts(&self) -> RepoResult<Vec<Account>>;
    /// Lists distinct recipe ids referenced by any favorites set.
    fn favorited_recipe_ids(&self) -> RepoResult<Vec<RecipeId>>;
}

/// SQLite-backed account store.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["accounts", "account_favorites"])?;
        Ok(Self { conn })
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn create_account(&self, account: &NewAccount) -> RepoResult<Account> {
        account.validate()?;

        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO accounts (
                    uuid,
                    username,
                    email,
                    credential_hash
                ) VALUES (?1, ?2, ?3, ?4);",
                params![
                    id.to_string(),
                    account.username.as_str(),
                    account.email.as_str(),
                    account.credential_hash.as_str(),
                ],
            )
            .map_err(map_identity_write_error)?;

        load_required_account(self.conn, id)
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        load_account(self.conn, id)
    }

    fn find_account_by_identifier(&self, identifier: &str) -> RepoResult<Option<Account>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AccountValidationError::EmptyIdentifier.into());
        }

        let mut stmt = self.conn.prepare(&format!(
            "{ACCOUNT_SELECT_SQL}
             WHERE username = ?1
                OR email = ?1
             ORDER BY CASE WHEN username = ?1 THEN 0 ELSE 1 END
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([identifier])?;
        if let Some(row) = rows.next()? {
            let mut account = parse_account_row(row)?;
            account.favorite_recipe_ids = load_favorite_ids(self.conn, account.id)?;
            return Ok(Some(account));
        }
        Ok(None)
    }

    fn update_account(&self, id: AccountId, patch: &AccountPatch) -> RepoResult<Account> {
        patch.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE accounts
                 SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    credential_hash = COALESCE(?4, credential_hash),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    id.to_string(),
                    patch.username.as_deref(),
                    patch.email.as_deref(),
                    patch.credential_hash.as_deref(),
                ],
            )
            .map_err(map_identity_write_error)?;

        if changed == 0 {
            return Err(RepoError::AccountNotFound(id));
        }

        load_required_account(self.conn, id)
    }

    fn delete_account(&self, id: AccountId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_account_exists(&tx, id)?;

        tx.execute(
            "DELETE FROM account_favorites WHERE account_uuid = ?1;",
            [id.to_string()],
        )?;
        tx.execute("DELETE FROM accounts WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    RepoError::StillOwnsRecipes(id)
                } else {
                    err.into()
                }
            })?;

        tx.commit()?;
        Ok(())
    }

    fn remove_favorite_everywhere(&self, recipe_id: RecipeId) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE accounts
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid IN (
                SELECT account_uuid
                FROM account_favorites
                WHERE recipe_uuid = ?1
             );",
            [recipe_id.to_string()],
        )?;
        let removed = tx.execute(
            "DELETE FROM account_favorites WHERE recipe_uuid = ?1;",
            [recipe_id.to_string()],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    fn pull_favorite_for_account(
        &self,
        id: AccountId,
        recipe_id: RecipeId,
    ) -> RepoResult<Account> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_account_exists(&tx, id)?;
        if delete_favorite_row(&tx, id, recipe_id)? {
            touch_account(&tx, id)?;
        }
        let account = load_required_account(&tx, id)?;
        tx.commit()?;
        Ok(account)
    }

    fn push_favorite_for_account(
        &self,
        id: AccountId,
        recipe_id: RecipeId,
    ) -> RepoResult<Account> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_account_exists(&tx, id)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO account_favorites (account_uuid, recipe_uuid)
             VALUES (?1, ?2);",
            [id.to_string(), recipe_id.to_string()],
        )?;
        if inserted > 0 {
            touch_account(&tx, id)?;
        }
        let account = load_required_account(&tx, id)?;
        tx.commit()?;
        Ok(account)
    }

    fn toggle_favorite_for_account(
        &self,
        id: AccountId,
        recipe_id: RecipeId,
    ) -> RepoResult<FavoriteToggle> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_account_exists(&tx, id)?;

        let state = if delete_favorite_row(&tx, id, recipe_id)? {
            FavoriteState::Removed
        } else {
            tx.execute(
                "INSERT INTO account_favorites (account_uuid, recipe_uuid)
                 VALUES (?1, ?2);",
                [id.to_string(), recipe_id.to_string()],
            )?;
            FavoriteState::Added
        };
        touch_account(&tx, id)?;

        let favorite_recipe_ids = load_favorite_ids(&tx, id)?;
        tx.commit()?;

        Ok(FavoriteToggle {
            recipe_id,
            state,
            favorite_recipe_ids,
        })
    }

    fn mark_deletion_pending(&self, id: AccountId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET
                deletion_pending = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::AccountNotFound(id));
        }
        Ok(())
    }

    fn list_pending_deletions(&self) -> RepoResult<Vec<AccountId>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid
             FROM accounts
             WHERE deletion_pending = 1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "accounts.uuid")?);
        }
        Ok(ids)
    }

    fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACCOUNT_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }
        for account in &mut accounts {
            account.favorite_recipe_ids = load_favorite_ids(self.conn, account.id)?;
        }
        Ok(accounts)
    }

    fn favorited_recipe_ids(&self) -> RepoResult<Vec<RecipeId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT recipe_uuid
             FROM account_favorites
             ORDER BY recipe_uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "account_favorites.recipe_uuid")?);
        }
        Ok(ids)
    }
}

fn map_identity_write_error(err: rusqlite::Error) -> RepoError {
    match duplicate_identity_field(&err) {
        Some(field) => RepoError::Duplicate(field),
        None => err.into(),
    }
}

fn ensure_account_exists(conn: &Connection, id: AccountId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(RepoError::AccountNotFound(id));
    }
    Ok(())
}

fn touch_account(conn: &Connection, id: AccountId) -> RepoResult<()> {
    conn.execute(
        "UPDATE accounts
         SET updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1;",
        [id.to_string()],
    )?;
    Ok(())
}

fn delete_favorite_row(conn: &Connection, id: AccountId, recipe_id: RecipeId) -> RepoResult<bool> {
    let removed = conn.execute(
        "DELETE FROM account_favorites
         WHERE account_uuid = ?1
           AND recipe_uuid = ?2;",
        [id.to_string(), recipe_id.to_string()],
    )?;
    Ok(removed > 0)
}

fn load_account(conn: &Connection, id: AccountId) -> RepoResult<Option<Account>> {
    let mut stmt = conn.prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        let mut account = parse_account_row(row)?;
        account.favorite_recipe_ids = load_favorite_ids(conn, account.id)?;
        return Ok(Some(account));
    }
    Ok(None)
}

fn load_required_account(conn: &Connection, id: AccountId) -> RepoResult<Account> {
    load_account(conn, id)?.ok_or(RepoError::AccountNotFound(id))
}

fn load_favorite_ids(conn: &Connection, id: AccountId) -> RepoResult<Vec<RecipeId>> {
    let mut stmt = conn.prepare(
        "SELECT recipe_uuid
         FROM account_favorites
         WHERE account_uuid = ?1
         ORDER BY rowid ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "account_favorites.recipe_uuid")?);
    }
    Ok(ids)
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "accounts.uuid")?;
    let deletion_pending = parse_bool(row.get("deletion_pending")?, "accounts.deletion_pending")?;

    Ok(Account {
        id,
        username: row.get("username")?,
        email: row.get("email")?,
        credential_hash: row.get("credential_hash")?,
        favorite_recipe_ids: Vec::new(),
        deletion_pending,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
