//! Recipe store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist recipe rows and their ordered ingredient lines.
//! - Provide owner/category/title listing used by browse and search views.
//!
//! # Invariants
//! - `owner_uuid` is written once on insert and never updated.
//! - A recipe and its ingredient lines are written and removed in one
//!   transaction.
//! - Listing is deterministic: creation order, ties broken by insert order.
//! - This store never reads or writes favorites.

use crate::model::account::AccountId;
use crate::model::recipe::{Recipe, RecipeChanges, RecipeFields, RecipeId};
use crate::repo::sqlite_support::{ensure_connection_ready, is_foreign_key_violation, parse_uuid};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use uuid::Uuid;

const RECIPE_SELECT_SQL: &str = "SELECT
    uuid,
    owner_uuid,
    title,
    description,
    image_ref,
    category,
    created_at,
    updated_at
FROM recipes";

/// Ids bound per `existing_ids` statement; SQLite caps bound variables per
/// statement.
const EXISTING_IDS_CHUNK: usize = 500;

/// Upper bound for one page of recipe listing.
pub const RECIPE_LIST_LIMIT_MAX: u32 = 100;

/// Filter and pagination options for recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeListQuery {
    /// Only recipes authored by this account.
    pub owner_id: Option<AccountId>,
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring of the title.
    pub title_contains: Option<String>,
    /// Maximum rows to return. Clamped to `RECIPE_LIST_LIMIT_MAX`.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Store interface for recipes.
pub trait RecipeRepository {
    /// Inserts a recipe authored by `owner_id`.
    fn create_recipe(&self, fields: &RecipeFields, owner_id: AccountId) -> RepoResult<Recipe>;
    /// Loads one recipe.
    fn get_recipe(&self, id: RecipeId) -> RepoResult<Option<Recipe>>;
    /// Lists every recipe.
    fn list_all(&self) -> RepoResult<Vec<Recipe>>;
    /// Lists recipes authored by `owner_id`.
    fn list_by_owner(&self, owner_id: AccountId) -> RepoResult<Vec<Recipe>>;
    /// Lists recipes matching filter and pagination options.
    fn list_recipes(&self, query: &RecipeListQuery) -> RepoResult<Vec<Recipe>>;
    /// Applies provided change fields.
    fn update_recipe(&self, id: RecipeId, changes: &RecipeChanges) -> RepoResult<Recipe>;
    /// Removes a recipe and its ingredient lines.
    fn delete_recipe(&self, id: RecipeId) -> RepoResult<()>;
    /// Returns the subset of `ids` that currently exist.
    fn existing_ids(&self, ids: &[RecipeId]) -> RepoResult<HashSet<RecipeId>>;
}

/// SQLite-backed recipe store.
pub struct SqliteRecipeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecipeRepository<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["recipes", "recipe_ingredients"])?;
        Ok(Self { conn })
    }
}

impl RecipeRepository for SqliteRecipeRepository<'_> {
    fn create_recipe(&self, fields: &RecipeFields, owner_id: AccountId) -> RepoResult<Recipe> {
        fields.validate()?;

        let id = Uuid::new_v4();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO recipes (
                uuid,
                owner_uuid,
                title,
                description,
                image_ref,
                category
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                owner_id.to_string(),
                fields.title.as_str(),
                fields.description.as_str(),
                fields.image_ref.as_str(),
                fields.category.as_str(),
            ],
        )
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                RepoError::MissingOwner(owner_id)
            } else {
                err.into()
            }
        })?;
        insert_ingredients(&tx, id, &fields.ingredients)?;

        let recipe = load_required_recipe(&tx, id)?;
        tx.commit()?;
        Ok(recipe)
    }

    fn get_recipe(&self, id: RecipeId) -> RepoResult<Option<Recipe>> {
        load_recipe(self.conn, id)
    }

    fn list_all(&self) -> RepoResult<Vec<Recipe>> {
        self.list_recipes(&RecipeListQuery::default())
    }

    fn list_by_owner(&self, owner_id: AccountId) -> RepoResult<Vec<Recipe>> {
        self.list_recipes(&RecipeListQuery {
            owner_id: Some(owner_id),
            ..RecipeListQuery::default()
        })
    }

    fn list_recipes(&self, query: &RecipeListQuery) -> RepoResult<Vec<Recipe>> {
        let mut sql = format!("{RECIPE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(owner_id) = query.owner_id {
            sql.push_str(" AND owner_uuid = ?");
            bind_values.push(Value::Text(owner_id.to_string()));
        }

        if let Some(category) = query.category.as_deref() {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.to_string()));
        }

        if let Some(needle) = query.title_contains.as_deref() {
            sql.push_str(" AND instr(lower(title), lower(?)) > 0");
            bind_values.push(Value::Text(needle.to_string()));
        }

        sql.push_str(" ORDER BY created_at ASC, rowid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit.min(RECIPE_LIST_LIMIT_MAX))));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut recipes = Vec::new();
        while let Some(row) = rows.next()? {
            recipes.push(parse_recipe_row(row)?);
        }
        for recipe in &mut recipes {
            recipe.ingredients = load_ingredients(self.conn, recipe.id)?;
        }
        Ok(recipes)
    }

    fn update_recipe(&self, id: RecipeId, changes: &RecipeChanges) -> RepoResult<Recipe> {
        changes.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE recipes
             SET
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                image_ref = COALESCE(?4, image_ref),
                category = COALESCE(?5, category),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                changes.title.as_deref(),
                changes.description.as_deref(),
                changes.image_ref.as_deref(),
                changes.category.as_deref(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::RecipeNotFound(id));
        }

        if let Some(ingredients) = &changes.ingredients {
            tx.execute(
                "DELETE FROM recipe_ingredients WHERE recipe_uuid = ?1;",
                [id.to_string()],
            )?;
            insert_ingredients(&tx, id, ingredients)?;
        }

        let recipe = load_required_recipe(&tx, id)?;
        tx.commit()?;
        Ok(recipe)
    }

    fn delete_recipe(&self, id: RecipeId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_uuid = ?1;",
            [id.to_string()],
        )?;
        let removed = tx.execute("DELETE FROM recipes WHERE uuid = ?1;", [id.to_string()])?;
        if removed == 0 {
            return Err(RepoError::RecipeNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn existing_ids(&self, ids: &[RecipeId]) -> RepoResult<HashSet<RecipeId>> {
        let mut existing = HashSet::new();
        for chunk in ids.chunks(EXISTING_IDS_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = self.conn.prepare(&format!(
                "SELECT uuid FROM recipes WHERE uuid IN ({placeholders});"
            ))?;
            let mut rows = stmt.query(params_from_iter(chunk.iter().map(|id| id.to_string())))?;
            while let Some(row) = rows.next()? {
                let value: String = row.get(0)?;
                existing.insert(parse_uuid(&value, "recipes.uuid")?);
            }
        }
        Ok(existing)
    }
}

fn insert_ingredients(conn: &Connection, id: RecipeId, ingredients: &[String]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO recipe_ingredients (recipe_uuid, position, value)
         VALUES (?1, ?2, ?3);",
    )?;
    for (position, value) in ingredients.iter().enumerate() {
        stmt.execute(params![id.to_string(), position as i64, value.as_str()])?;
    }
    Ok(())
}

fn load_ingredients(conn: &Connection, id: RecipeId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT value
         FROM recipe_ingredients
         WHERE recipe_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut ingredients = Vec::new();
    while let Some(row) = rows.next()? {
        ingredients.push(row.get(0)?);
    }
    Ok(ingredients)
}

fn load_recipe(conn: &Connection, id: RecipeId) -> RepoResult<Option<Recipe>> {
    let mut stmt = conn.prepare(&format!("{RECIPE_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        let mut recipe = parse_recipe_row(row)?;
        recipe.ingredients = load_ingredients(conn, recipe.id)?;
        return Ok(Some(recipe));
    }
    Ok(None)
}

fn load_required_recipe(conn: &Connection, id: RecipeId) -> RepoResult<Recipe> {
    load_recipe(conn, id)?.ok_or(RepoError::RecipeNotFound(id))
}

fn parse_recipe_row(row: &Row<'_>) -> RepoResult<Recipe> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;

    Ok(Recipe {
        id: parse_uuid(&uuid_text, "recipes.uuid")?,
        owner_id: parse_uuid(&owner_text, "recipes.owner_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        image_ref: row.get("image_ref")?,
        category: row.get("category")?,
        ingredients: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
