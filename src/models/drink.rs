use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;

/// One ingredient of a drink, in the proportions shown on the menu graphic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipePart {
    #[schema(example = "#8B4513")]
    pub color: String,
    #[schema(example = "espresso")]
    pub name: String,
    #[serde(default = "default_parts")]
    #[schema(example = 1)]
    pub parts: u32,
}

fn default_parts() -> u32 {
    1
}

/// Recipe part without the ingredient name, for the public menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShortRecipePart {
    pub color: String,
    pub parts: u32,
}

impl From<&RecipePart> for ShortRecipePart {
    fn from(part: &RecipePart) -> Self {
        Self {
            color: part.color.clone(),
            parts: part.parts,
        }
    }
}

/// Long form of a drink: the full recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Drink {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<RecipePart>,
}

/// Short form of a drink: colours and proportions only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DrinkShort {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<ShortRecipePart>,
}

impl Drink {
    pub fn short(&self) -> DrinkShort {
        DrinkShort {
            id: self.id,
            title: self.title.clone(),
            recipe: self.recipe.iter().map(ShortRecipePart::from).collect(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbDrink {
    pub id: i64,
    pub title: String,
    pub recipe: String,
}

impl TryFrom<DbDrink> for Drink {
    type Error = AppError;

    fn try_from(value: DbDrink) -> Result<Self, Self::Error> {
        let recipe = serde_json::from_str(&value.recipe).map_err(|err| {
            AppError::internal(format!("stored recipe for drink {} is invalid: {err}", value.id))
        })?;

        Ok(Drink {
            id: value.id,
            title: value.title,
            recipe,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DrinkCreateRequest {
    #[schema(example = "Flat White")]
    pub title: Option<String>,
    pub recipe: Option<Vec<RecipePart>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DrinkUpdateRequest {
    #[schema(example = "Cortado")]
    pub title: Option<String>,
    pub recipe: Option<Vec<RecipePart>>,
}

#[derive(Debug, Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: Vec<T>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DrinkResponse {
    pub success: bool,
    pub drink: Drink,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i64,
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

pub fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::unprocessable("title must not be empty"));
    }
    Ok(title.to_string())
}

pub fn validate_recipe(recipe: &[RecipePart]) -> Result<(), AppError> {
    for (index, part) in recipe.iter().enumerate() {
        if !is_hex_color(&part.color) {
            return Err(AppError::unprocessable(format!(
                "recipe part {index}: color '{}' is not a hex color",
                part.color
            )));
        }
        if part.name.trim().is_empty() {
            return Err(AppError::unprocessable(format!(
                "recipe part {index}: name must not be empty"
            )));
        }
        if part.parts == 0 {
            return Err(AppError::unprocessable(format!(
                "recipe part {index}: parts must be at least 1"
            )));
        }
    }
    Ok(())
}
