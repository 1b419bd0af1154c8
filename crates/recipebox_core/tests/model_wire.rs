use recipebox_core::{
    Account, FavoriteState, FavoriteToggle, IngredientsInput, NewRecipe, RecipePatch,
};
use serde_json::json;
use uuid::Uuid;

#[test]
fn account_serialization_omits_credential_hash() {
    let account = Account {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
        email: "alice@x.com".to_string(),
        credential_hash: "argon2:secret".to_string(),
        favorite_recipe_ids: vec![Uuid::new_v4()],
        deletion_pending: false,
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000,
    };

    let value = serde_json::to_value(&account).unwrap();
    assert!(value.get("credential_hash").is_none());
    assert_eq!(value["username"], "alice");
    assert_eq!(value["favorite_recipe_ids"].as_array().unwrap().len(), 1);

    let decoded: Account = serde_json::from_value(value).unwrap();
    assert!(decoded.credential_hash.is_empty());
    assert_eq!(decoded.id, account.id);
}

#[test]
fn recipe_input_accepts_text_or_list_ingredients() {
    let from_text: NewRecipe = serde_json::from_value(json!({
        "title": "Pasta",
        "description": "Fresh pasta",
        "image_ref": "images/pasta.jpg",
        "category": "Dinner",
        "ingredients": "flour, eggs"
    }))
    .unwrap();
    assert_eq!(
        from_text.ingredients,
        IngredientsInput::Text("flour, eggs".to_string())
    );
    assert_eq!(
        from_text.into_fields().unwrap().ingredients,
        vec!["flour", "eggs"]
    );

    let from_list: NewRecipe = serde_json::from_value(json!({
        "title": "Soup",
        "description": "Leek soup",
        "image_ref": "images/soup.jpg",
        "category": "Lunch",
        "ingredients": ["leek", " water "]
    }))
    .unwrap();
    assert_eq!(
        from_list.into_fields().unwrap().ingredients,
        vec!["leek", "water"]
    );

    let without_ingredients: NewRecipe = serde_json::from_value(json!({
        "title": "Toast",
        "description": "Toast",
        "image_ref": "images/toast.jpg",
        "category": "Breakfast"
    }))
    .unwrap();
    assert_eq!(without_ingredients.ingredients, IngredientsInput::default());
}

#[test]
fn recipe_patch_has_no_owner_field() {
    let patch: RecipePatch = serde_json::from_value(json!({
        "title": "Renamed",
        "owner_id": Uuid::new_v4().to_string()
    }))
    .unwrap();
    assert_eq!(patch.title.as_deref(), Some("Renamed"));

    let encoded = serde_json::to_value(&patch).unwrap();
    assert!(encoded.get("owner_id").is_none());
}

#[test]
fn favorite_toggle_uses_snake_case_state() {
    let toggle = FavoriteToggle {
        recipe_id: Uuid::new_v4(),
        state: FavoriteState::Added,
        favorite_recipe_ids: Vec::new(),
    };
    let value = serde_json::to_value(&toggle).unwrap();
    assert_eq!(value["state"], "added");
}
