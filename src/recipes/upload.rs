use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";

/// Storage key for an uploaded recipe image.
///
/// Only the extension of `original_filename` survives: the text after the last
/// `.` of its base name, case kept, empty when there is none. Any directory
/// part (`/` or `\` separated) is discarded first and the stem is replaced by
/// `random_id`.
pub fn derive_path(original_filename: &str, random_id: &str) -> String {
    let base = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let ext = base.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    format!("{RECIPE_IMAGE_DIR}/{random_id}.{ext}")
}

pub struct UploadItem<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub body: Bytes,
}

/// Stores the image under a fresh path and points the principal's recipe at it.
pub async fn store_recipe_image(
    st: &AppState,
    principal: Uuid,
    recipe_id: Uuid,
    item: UploadItem<'_>,
) -> Result<String, AppError> {
    let recipe = st
        .recipes
        .get_owned(principal, recipe_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let key = derive_path(item.filename, &Uuid::new_v4().to_string());
    st.storage
        .put_object(&key, item.body, item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    if !st.recipes.set_image(principal, recipe_id, &key).await? {
        if let Err(e) = st.storage.delete_object(&key).await {
            warn!(error = %e, key = %key, "failed to delete unrecorded image");
        }
        return Err(AppError::NotFound);
    }
    info!(%recipe_id, user_id = %principal, key = %key, "recipe image stored");

    if let Some(old) = recipe.row.image.filter(|old| old != &key) {
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete replaced image");
        }
    }
    Ok(key)
}
