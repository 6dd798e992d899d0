//! Owner-scoped access to tags, ingredients and recipes.
//!
//! Every read and write here takes the authenticated principal and passes it
//! down to the repository, so a query can never see another user's rows.
//! Lookups of a row that is absent and of a row owned by someone else both
//! end in [`AppError::NotFound`].

use tracing::{info, warn};
use uuid::Uuid;

use super::model::{Attr, AttrKind, NewRecipe, Recipe, RecipeChanges};
use super::repo::{AttrRepo, RecipeRepo};
use crate::error::AppError;

const NAME_MAX_LEN: usize = 255;

pub async fn list_for_principal(
    repo: &dyn AttrRepo,
    principal: Uuid,
) -> Result<Vec<Attr>, AppError> {
    Ok(repo.list_owned(principal).await?)
}

/// Creates a tag or ingredient owned by `principal`.
pub async fn create_for_principal(
    repo: &dyn AttrRepo,
    principal: Uuid,
    name: Option<String>,
) -> Result<Attr, AppError> {
    let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::required("name"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(AppError::invalid(
            "name",
            format!("Ensure this field has no more than {NAME_MAX_LEN} characters."),
        ));
    }
    let attr = repo.create_owned(principal, &name).await?;
    info!(id = %attr.id, user_id = %principal, "attribute created");
    Ok(attr)
}

pub async fn list_recipes_for_principal(
    repo: &dyn RecipeRepo,
    principal: Uuid,
) -> Result<Vec<Recipe>, AppError> {
    Ok(repo.list_owned(principal).await?)
}

pub async fn retrieve_detail(
    repo: &dyn RecipeRepo,
    principal: Uuid,
    id: Uuid,
) -> Result<Recipe, AppError> {
    repo.get_owned(principal, id)
        .await?
        .ok_or(AppError::NotFound)
}

/// Repositories a recipe write touches.
pub struct RecipeRepos<'a> {
    pub recipes: &'a dyn RecipeRepo,
    pub tags: &'a dyn AttrRepo,
    pub ingredients: &'a dyn AttrRepo,
}

impl RecipeRepos<'_> {
    fn attrs(&self, kind: AttrKind) -> &dyn AttrRepo {
        match kind {
            AttrKind::Tag => self.tags,
            AttrKind::Ingredient => self.ingredients,
        }
    }

    /// Every linked id must name one of the principal's own rows.
    async fn ensure_owned_links(
        &self,
        kind: AttrKind,
        principal: Uuid,
        ids: &[Uuid],
    ) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let owned = self.attrs(kind).owned_ids(principal, ids).await?;
        if let Some(bad) = ids.iter().find(|id| !owned.contains(id)) {
            warn!(user_id = %principal, id = %bad, field = kind.field(), "link to foreign or missing row");
            return Err(AppError::Validation {
                field: kind.field(),
                code: "does_not_exist",
                message: format!("Invalid pk \"{bad}\" - object does not exist."),
            });
        }
        Ok(())
    }
}

pub async fn create_recipe_for_principal(
    repos: &RecipeRepos<'_>,
    principal: Uuid,
    new: NewRecipe,
) -> Result<Recipe, AppError> {
    repos
        .ensure_owned_links(AttrKind::Tag, principal, &new.tags)
        .await?;
    repos
        .ensure_owned_links(AttrKind::Ingredient, principal, &new.ingredients)
        .await?;

    let recipe = repos.recipes.create_owned(principal, new).await?;
    info!(id = %recipe.row.id, user_id = %principal, "recipe created");
    Ok(recipe)
}

pub async fn update_for_principal(
    repos: &RecipeRepos<'_>,
    principal: Uuid,
    id: Uuid,
    changes: RecipeChanges,
) -> Result<Recipe, AppError> {
    for kind in [AttrKind::Tag, AttrKind::Ingredient] {
        if let Some(ids) = changes.links(kind) {
            repos.ensure_owned_links(kind, principal, ids).await?;
        }
    }

    let recipe = repos
        .recipes
        .update_owned(principal, id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(%id, user_id = %principal, "recipe updated");
    Ok(recipe)
}
