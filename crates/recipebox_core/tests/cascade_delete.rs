use recipebox_core::db::open_db_in_memory;
use recipebox_core::{
    sqlite_engine, Account, AccountId, AccountRepository, ConsistencyEngine, EngineError,
    ErrorKind, NewAccount, NewRecipe, Recipe, RecipeChanges, RecipeFields, RecipeId,
    RecipeListQuery, RecipeRepository, RepoError, RepoResult, SqliteAccountRepository,
    SqliteRecipeRepository,
};
use rusqlite::Connection;
use std::collections::HashSet;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn account(conn: &Connection, username: &str) -> Account {
    sqlite_engine(conn)
        .unwrap()
        .create_account(NewAccount::new(
            username,
            format!("{username}@x.com"),
            "argon2:hash",
        ))
        .unwrap()
}

fn recipe(conn: &Connection, owner: &Account, title: &str) -> Recipe {
    sqlite_engine(conn)
        .unwrap()
        .create_recipe(
            NewRecipe {
                title: title.to_string(),
                description: "desc".to_string(),
                image_ref: "images/x.jpg".to_string(),
                category: "Dinner".to_string(),
                ingredients: "flour, water".into(),
            },
            Some(owner.id),
        )
        .unwrap()
}

/// Every recipe has a live owner and every favorite points at a live recipe.
fn assert_referential_integrity(conn: &Connection) {
    let accounts = SqliteAccountRepository::try_new(conn)
        .unwrap()
        .list_accounts()
        .unwrap();
    let recipes = SqliteRecipeRepository::try_new(conn)
        .unwrap()
        .list_all()
        .unwrap();

    let account_ids: HashSet<_> = accounts.iter().map(|account| account.id).collect();
    let recipe_ids: HashSet<_> = recipes.iter().map(|recipe| recipe.id).collect();

    for recipe in &recipes {
        assert!(
            account_ids.contains(&recipe.owner_id),
            "recipe {} has no owner",
            recipe.id
        );
    }
    for account in &accounts {
        for favorite in &account.favorite_recipe_ids {
            assert!(
                recipe_ids.contains(favorite),
                "account {} favorites missing recipe {favorite}",
                account.id
            );
        }
    }
}

#[test]
fn deleting_recipe_removes_it_from_every_favorites_set() {
    let conn = setup();
    let engine = sqlite_engine(&conn).unwrap();
    let alice = account(&conn, "alice");
    let bob = account(&conn, "bob");
    let carol = account(&conn, "carol");
    let pasta = recipe(&conn, &alice, "Pasta");
    let soup = recipe(&conn, &alice, "Soup");

    engine.toggle_favorite(bob.id, pasta.id).unwrap();
    engine.toggle_favorite(carol.id, pasta.id).unwrap();
    engine.toggle_favorite(carol.id, soup.id).unwrap();

    let deletion = engine.delete_recipe(pasta.id, Some(alice.id)).unwrap();
    assert_eq!(deletion.recipe_id, pasta.id);
    assert_eq!(deletion.favorites_removed, 2);

    assert!(matches!(
        engine.get_recipe(pasta.id),
        Err(EngineError::RecipeNotFound(_))
    ));
    assert!(engine.get_account(bob.id).unwrap().favorite_recipe_ids.is_empty());
    assert_eq!(
        engine.get_account(carol.id).unwrap().favorite_recipe_ids,
        vec![soup.id]
    );
    assert_referential_integrity(&conn);
}

#[test]
fn deleting_account_removes_owned_recipes_and_their_references() {
    let conn = setup();
    let engine = sqlite_engine(&conn).unwrap();
    let alice = account(&conn, "alice");
    let bob = account(&conn, "bob");
    let pasta = recipe(&conn, &alice, "Pasta");
    let soup = recipe(&conn, &alice, "Soup");
    let pie = recipe(&conn, &bob, "Pie");

    engine.toggle_favorite(bob.id, pasta.id).unwrap();
    engine.toggle_favorite(bob.id, pie.id).unwrap();
    engine.toggle_favorite(alice.id, pie.id).unwrap();

    let deletion = engine.delete_account(alice.id).unwrap();
    assert_eq!(deletion.account_id, alice.id);
    assert_eq!(deletion.recipes_deleted, 2);
    assert_eq!(deletion.favorites_removed, 1);

    assert!(matches!(
        engine.get_account(alice.id),
        Err(EngineError::AccountNotFound(_))
    ));
    for removed in [pasta.id, soup.id] {
        assert!(matches!(
            engine.get_recipe(removed),
            Err(EngineError::RecipeNotFound(_))
        ));
    }
    assert_eq!(
        engine.get_account(bob.id).unwrap().favorite_recipe_ids,
        vec![pie.id]
    );
    assert_eq!(engine.list_all_recipes().unwrap(), vec![pie]);
    assert_referential_integrity(&conn);
}

#[test]
fn deleting_account_without_recipes_succeeds() {
    let conn = setup();
    let engine = sqlite_engine(&conn).unwrap();
    let alice = account(&conn, "alice");

    let deletion = engine.delete_account(alice.id).unwrap();
    assert_eq!(deletion.recipes_deleted, 0);
    assert_eq!(deletion.favorites_removed, 0);
    assert!(matches!(
        engine.authenticate_by_identifier("alice"),
        Err(EngineError::IdentifierNotFound)
    ));

    // Identity becomes available again.
    account(&conn, "alice");
}

#[test]
fn interrupted_account_delete_is_finished_on_resume() {
    let conn = setup();
    let engine = sqlite_engine(&conn).unwrap();
    let alice = account(&conn, "alice");
    let bob = account(&conn, "bob");
    let pasta = recipe(&conn, &alice, "Pasta");
    let soup = recipe(&conn, &alice, "Soup");
    engine.toggle_favorite(bob.id, pasta.id).unwrap();
    engine.toggle_favorite(bob.id, soup.id).unwrap();

    // State left behind by a crash after the first recipe row was removed
    // but before its favorites sweep.
    let accounts = SqliteAccountRepository::try_new(&conn).unwrap();
    accounts.mark_deletion_pending(alice.id).unwrap();
    SqliteRecipeRepository::try_new(&conn)
        .unwrap()
        .delete_recipe(pasta.id)
        .unwrap();
    assert_eq!(accounts.list_pending_deletions().unwrap(), vec![alice.id]);

    let completed = engine.resume_pending_deletions().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].account_id, alice.id);
    assert_eq!(completed[0].recipes_deleted, 1);

    assert!(accounts.list_pending_deletions().unwrap().is_empty());
    assert!(engine.get_account(bob.id).unwrap().favorite_recipe_ids.is_empty());
    assert!(engine.list_all_recipes().unwrap().is_empty());
    assert_referential_integrity(&conn);

    assert!(engine.resume_pending_deletions().unwrap().is_empty());
}

#[test]
fn deleted_recipe_cannot_be_deleted_twice() {
    let conn = setup();
    let engine = sqlite_engine(&conn).unwrap();
    let alice = account(&conn, "alice");
    let pasta = recipe(&conn, &alice, "Pasta");

    engine.delete_recipe(pasta.id, Some(alice.id)).unwrap();
    assert!(matches!(
        engine.delete_recipe(pasta.id, Some(alice.id)),
        Err(EngineError::RecipeNotFound(_))
    ));
}

fn late_fields(title: &str) -> RecipeFields {
    RecipeFields {
        title: title.to_string(),
        description: "desc".to_string(),
        image_ref: "images/x.jpg".to_string(),
        category: "Dinner".to_string(),
        ingredients: vec!["flour".to_string()],
    }
}

#[test]
fn recipe_written_after_pending_flag_is_still_deleted_with_account() {
    let conn = setup();
    let engine = sqlite_engine(&conn).unwrap();
    let alice = account(&conn, "alice");
    let bob = account(&conn, "bob");
    let pasta = recipe(&conn, &alice, "Pasta");

    // A creation that passed the pending check before the flag was set.
    SqliteAccountRepository::try_new(&conn)
        .unwrap()
        .mark_deletion_pending(alice.id)
        .unwrap();
    let late = SqliteRecipeRepository::try_new(&conn)
        .unwrap()
        .create_recipe(&late_fields("Late"), alice.id)
        .unwrap();
    engine.toggle_favorite(bob.id, late.id).unwrap();
    assert_referential_integrity(&conn);

    let deletion = engine.delete_account(alice.id).unwrap();
    assert_eq!(deletion.recipes_deleted, 2);
    assert_eq!(deletion.favorites_removed, 1);
    for removed in [pasta.id, late.id] {
        assert!(matches!(
            engine.get_recipe(removed),
            Err(EngineError::RecipeNotFound(_))
        ));
    }
    assert!(engine.get_account(bob.id).unwrap().favorite_recipe_ids.is_empty());
    assert_referential_integrity(&conn);
}

/// Recipe store where every delete is immediately followed by a new recipe
/// for the same owner, as if a creator kept racing the account delete.
struct RacingCreator<'conn> {
    inner: SqliteRecipeRepository<'conn>,
    owner_id: AccountId,
}

impl RecipeRepository for RacingCreator<'_> {
    fn create_recipe(&self, fields: &RecipeFields, owner_id: AccountId) -> RepoResult<Recipe> {
        self.inner.create_recipe(fields, owner_id)
    }
    fn get_recipe(&self, id: RecipeId) -> RepoResult<Option<Recipe>> {
        self.inner.get_recipe(id)
    }
    fn list_all(&self) -> RepoResult<Vec<Recipe>> {
        self.inner.list_all()
    }
    fn list_by_owner(&self, owner_id: AccountId) -> RepoResult<Vec<Recipe>> {
        self.inner.list_by_owner(owner_id)
    }
    fn list_recipes(&self, query: &RecipeListQuery) -> RepoResult<Vec<Recipe>> {
        self.inner.list_recipes(query)
    }
    fn update_recipe(&self, id: RecipeId, changes: &RecipeChanges) -> RepoResult<Recipe> {
        self.inner.update_recipe(id, changes)
    }
    fn delete_recipe(&self, id: RecipeId) -> RepoResult<()> {
        self.inner.delete_recipe(id)?;
        self.inner
            .create_recipe(&late_fields("Raced"), self.owner_id)
            .map(|_| ())
    }
    fn existing_ids(&self, ids: &[RecipeId]) -> RepoResult<HashSet<RecipeId>> {
        self.inner.existing_ids(ids)
    }
}

#[test]
fn account_stays_pending_when_creations_outlast_cascade_passes() {
    let conn = setup();
    let alice = account(&conn, "alice");
    recipe(&conn, &alice, "Pasta");

    let racing = ConsistencyEngine::new(
        SqliteAccountRepository::try_new(&conn).unwrap(),
        RacingCreator {
            inner: SqliteRecipeRepository::try_new(&conn).unwrap(),
            owner_id: alice.id,
        },
    );
    let err = racing.delete_account(alice.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(err.kind().is_retryable());
    assert!(matches!(
        err,
        EngineError::StoreUnavailable(RepoError::StillOwnsRecipes(id)) if id == alice.id
    ));

    let engine = sqlite_engine(&conn).unwrap();
    let pending = engine.get_account(alice.id).unwrap();
    assert!(pending.deletion_pending);
    assert_eq!(engine.list_my_recipes(Some(alice.id)).unwrap().len(), 1);
    assert_referential_integrity(&conn);

    let completed = engine.resume_pending_deletions().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].account_id, alice.id);
    assert_eq!(completed[0].recipes_deleted, 1);
    assert!(matches!(
        engine.get_account(alice.id),
        Err(EngineError::AccountNotFound(_))
    ));
    assert!(engine.list_all_recipes().unwrap().is_empty());
    assert_referential_integrity(&conn);
}
