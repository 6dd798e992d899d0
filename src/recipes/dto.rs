use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{Attr, NewRecipe, Recipe, RecipeChanges};
use crate::error::AppError;

const TITLE_MAX_LEN: usize = 255;
const LINK_MAX_LEN: usize = 255;
const PRICE_LIMIT: f64 = 1000.0; // NUMERIC(5,2)

#[derive(Debug, Deserialize)]
pub struct CreateAttrRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttrResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Attr> for AttrResponse {
    fn from(a: Attr) -> Self {
        Self {
            id: a.id,
            name: a.name,
        }
    }
}

/// Body of `POST /recipe/recipes/`, `PUT` and `PATCH` on a recipe.
/// Carries no owner field; the owner is always the caller.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeRequest {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    pub price: Option<PriceInput>,
    pub link: Option<String>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<Uuid>>,
}

fn check_title(raw: String) -> Result<String, AppError> {
    let title = raw.trim().to_string();
    if title.is_empty() {
        return Err(AppError::required("title"));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::invalid(
            "title",
            format!("Ensure this field has no more than {TITLE_MAX_LEN} characters."),
        ));
    }
    Ok(title)
}

fn check_minutes(raw: i64) -> Result<i32, AppError> {
    i32::try_from(raw)
        .ok()
        .filter(|m| *m >= 0)
        .ok_or_else(|| AppError::invalid("time_minutes", "Ensure this value is a non-negative integer."))
}

/// `price` as a JSON number or a decimal string such as `"5.00"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

fn check_price(raw: PriceInput) -> Result<f64, AppError> {
    let raw = match raw {
        PriceInput::Number(v) => v,
        PriceInput::Text(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|_| is_plain_decimal(text.trim()))
            .ok_or_else(|| AppError::invalid("price", "A valid number is required."))?,
    };

    if !raw.is_finite() || raw < 0.0 || raw >= PRICE_LIMIT {
        return Err(AppError::invalid(
            "price",
            "Ensure this value is between 0 and 999.99.",
        ));
    }
    let cents = raw * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(AppError::invalid(
            "price",
            "Ensure that there are no more than 2 decimal places.",
        ));
    }
    Ok(cents.round() / 100.0)
}

/// Digits with an optional sign and fraction; no exponent, `inf` or `NaN`.
fn is_plain_decimal(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    !(int.is_empty() && frac.is_empty())
        && int.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c.is_ascii_digit())
}

fn check_link(raw: String) -> Result<String, AppError> {
    let link = raw.trim().to_string();
    if link.chars().count() > LINK_MAX_LEN {
        return Err(AppError::invalid(
            "link",
            format!("Ensure this field has no more than {LINK_MAX_LEN} characters."),
        ));
    }
    Ok(link)
}

impl RecipeRequest {
    pub fn into_new(self) -> Result<NewRecipe, AppError> {
        Ok(NewRecipe {
            title: check_title(self.title.ok_or_else(|| AppError::required("title"))?)?,
            time_minutes: check_minutes(
                self.time_minutes
                    .ok_or_else(|| AppError::required("time_minutes"))?,
            )?,
            price: check_price(self.price.ok_or_else(|| AppError::required("price"))?)?,
            link: check_link(self.link.unwrap_or_default())?,
            tags: self.tags.unwrap_or_default(),
            ingredients: self.ingredients.unwrap_or_default(),
        })
    }

    /// `PUT`: every required field must be present, omitted link sets are cleared.
    pub fn into_replacement(self) -> Result<RecipeChanges, AppError> {
        let new = self.into_new()?;
        Ok(RecipeChanges {
            title: Some(new.title),
            time_minutes: Some(new.time_minutes),
            price: Some(new.price),
            link: Some(new.link),
            tags: Some(new.tags),
            ingredients: Some(new.ingredients),
        })
    }

    /// `PATCH`: only the fields present are validated and changed.
    pub fn into_patch(self) -> Result<RecipeChanges, AppError> {
        Ok(RecipeChanges {
            title: self.title.map(check_title).transpose()?,
            time_minutes: self.time_minutes.map(check_minutes).transpose()?,
            price: self.price.map(check_price).transpose()?,
            link: self.link.map(check_link).transpose()?,
            tags: self.tags,
            ingredients: self.ingredients,
        })
    }
}

/// List shape: links as ids only.
#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

impl From<Recipe> for RecipeListItem {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.row.id,
            title: r.row.title,
            time_minutes: r.row.time_minutes,
            price: r.row.price,
            link: r.row.link,
            image: r.row.image,
            tags: r.tags.into_iter().map(|t| t.id).collect(),
            ingredients: r.ingredients.into_iter().map(|i| i.id).collect(),
        }
    }
}

/// Detail shape: links nested.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<AttrResponse>,
    pub ingredients: Vec<AttrResponse>,
}

impl From<Recipe> for RecipeDetail {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.row.id,
            title: r.row.title,
            time_minutes: r.row.time_minutes,
            price: r.row.price,
            link: r.row.link,
            image: r.row.image,
            tags: r.tags.into_iter().map(Into::into).collect(),
            ingredients: r.ingredients.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: Uuid,
    pub image: String,
}
