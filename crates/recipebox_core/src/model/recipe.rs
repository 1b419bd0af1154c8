//! Recipe domain model.
//!
//! # Responsibility
//! - Define the user-authored recipe record and its input shapes.
//! - Normalize free-text and list ingredient input into one sequence.
//!
//! # Invariants
//! - `title`, `description`, `image_ref` and `category` are trimmed and
//!   non-empty.
//! - `ingredients` entries are trimmed and non-empty.
//! - `owner_id` is set once at creation; no input shape can rewrite it.

use crate::model::account::AccountId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a recipe.
pub type RecipeId = Uuid;

/// User-authored recipe with exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Stable recipe id.
    pub id: RecipeId,
    /// Authoring account. Immutable after creation.
    pub owner_id: AccountId,
    pub title: String,
    pub description: String,
    /// Image location supplied by the caller (URL or storage key).
    pub image_ref: String,
    pub category: String,
    /// Ordered ingredient lines.
    pub ingredients: Vec<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// Ingredient input as supplied by forms or generated content.
///
/// Free text is split on commas; list input is taken entry by entry. Blank
/// pieces are dropped in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientsInput {
    Text(String),
    List(Vec<String>),
}

impl IngredientsInput {
    /// Converts input into trimmed, non-empty ingredient lines.
    pub fn into_items(self) -> Vec<String> {
        match self {
            Self::Text(text) => split_ingredients(&text),
            Self::List(items) => items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

impl Default for IngredientsInput {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<&str> for IngredientsInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for IngredientsInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Splits comma-separated ingredient text into trimmed, non-empty lines.
pub fn split_ingredients(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Recipe creation input, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub image_ref: String,
    pub category: String,
    #[serde(default)]
    pub ingredients: IngredientsInput,
}

impl NewRecipe {
    /// Trims every field and validates required values.
    pub fn into_fields(self) -> Result<RecipeFields, RecipeValidationError> {
        let fields = RecipeFields {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            image_ref: self.image_ref.trim().to_string(),
            category: self.category.trim().to_string(),
            ingredients: self.ingredients.into_items(),
        };
        fields.validate()?;
        Ok(fields)
    }
}

/// Normalized, validated recipe content accepted by the recipe store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFields {
    pub title: String,
    pub description: String,
    pub image_ref: String,
    pub category: String,
    pub ingredients: Vec<String>,
}

impl RecipeFields {
    pub fn validate(&self) -> Result<(), RecipeValidationError> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("image_ref", &self.image_ref)?;
        require_text("category", &self.category)?;
        validate_ingredients(&self.ingredients)
    }
}

/// Partial recipe edit. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    pub category: Option<String>,
    pub ingredients: Option<IngredientsInput>,
}

impl RecipePatch {
    /// Trims provided fields and validates them.
    pub fn into_changes(self) -> Result<RecipeChanges, RecipeValidationError> {
        let changes = RecipeChanges {
            title: self.title.map(|value| value.trim().to_string()),
            description: self.description.map(|value| value.trim().to_string()),
            image_ref: self.image_ref.map(|value| value.trim().to_string()),
            category: self.category.map(|value| value.trim().to_string()),
            ingredients: self.ingredients.map(IngredientsInput::into_items),
        };
        changes.validate()?;
        Ok(changes)
    }
}

/// Normalized partial update accepted by the recipe store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    pub category: Option<String>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipeChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_ref.is_none()
            && self.category.is_none()
            && self.ingredients.is_none()
    }

    pub fn validate(&self) -> Result<(), RecipeValidationError> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("image_ref", &self.image_ref),
            ("category", &self.category),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        Ok(())
    }
}

/// Validation failures for recipe input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeValidationError {
    /// Required text field is blank after trimming.
    EmptyField(&'static str),
    /// Ingredient at the given position is blank.
    EmptyIngredient(usize),
}

impl Display for RecipeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "recipe {field} must not be blank"),
            Self::EmptyIngredient(position) => {
                write!(f, "recipe ingredient at position {position} must not be blank")
            }
        }
    }
}

impl Error for RecipeValidationError {}

fn require_text(field: &'static str, value: &str) -> Result<(), RecipeValidationError> {
    if value.trim().is_empty() {
        return Err(RecipeValidationError::EmptyField(field));
    }
    Ok(())
}

fn validate_ingredients(ingredients: &[String]) -> Result<(), RecipeValidationError> {
    match ingredients.iter().position(|item| item.trim().is_empty()) {
        Some(position) => Err(RecipeValidationError::EmptyIngredient(position)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{split_ingredients, IngredientsInput, NewRecipe, RecipePatch, RecipeValidationError};

    #[test]
    fn split_ingredients_trims_and_drops_blank_pieces() {
        assert_eq!(
            split_ingredients(" flour, ,eggs ,, milk,"),
            vec!["flour", "eggs", "milk"]
        );
        assert!(split_ingredients(" , ").is_empty());
    }

    #[test]
    fn list_input_is_trimmed_entry_by_entry() {
        let items = IngredientsInput::List(vec![
            " salt ".to_string(),
            "".to_string(),
            "olive oil, extra virgin".to_string(),
        ])
        .into_items();
        assert_eq!(items, vec!["salt", "olive oil, extra virgin"]);
    }

    #[test]
    fn into_fields_rejects_blank_required_field() {
        let input = NewRecipe {
            title: "Pasta".to_string(),
            description: "  ".to_string(),
            image_ref: "pasta.png".to_string(),
            category: "Dinner".to_string(),
            ingredients: "pasta, tomato".into(),
        };
        assert_eq!(
            input.into_fields().unwrap_err(),
            RecipeValidationError::EmptyField("description")
        );
    }

    #[test]
    fn patch_rejects_blank_provided_field_and_keeps_absent_ones() {
        let err = RecipePatch {
            category: Some(" ".to_string()),
            ..RecipePatch::default()
        }
        .into_changes()
        .unwrap_err();
        assert_eq!(err, RecipeValidationError::EmptyField("category"));

        let changes = RecipePatch {
            title: Some(" Soup ".to_string()),
            ..RecipePatch::default()
        }
        .into_changes()
        .expect("title-only patch is valid");
        assert_eq!(changes.title.as_deref(), Some("Soup"));
        assert!(changes.ingredients.is_none());
    }
}
