use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::model::{Attr, AttrKind, NewRecipe, Recipe, RecipeChanges, RecipeRow};

/// Tags or ingredients, always scoped to one owner.
#[async_trait]
pub trait AttrRepo: Send + Sync {
    /// Owner's rows, by name descending.
    async fn list_owned(&self, owner: Uuid) -> anyhow::Result<Vec<Attr>>;
    async fn create_owned(&self, owner: Uuid, name: &str) -> anyhow::Result<Attr>;
    /// The subset of `ids` that exist and belong to `owner`.
    async fn owned_ids(&self, owner: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>>;
}

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Owner's recipes, newest first.
    async fn list_owned(&self, owner: Uuid) -> anyhow::Result<Vec<Recipe>>;
    async fn get_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn create_owned(&self, owner: Uuid, new: NewRecipe) -> anyhow::Result<Recipe>;
    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>>;
    /// Records the stored image path. Returns false when the recipe is not the owner's.
    async fn set_image(&self, owner: Uuid, id: Uuid, path: &str) -> anyhow::Result<bool>;
}

// ---- Postgres ----

pub struct PgAttrRepo {
    db: PgPool,
    kind: AttrKind,
}

impl PgAttrRepo {
    pub fn new(db: PgPool, kind: AttrKind) -> Self {
        Self { db, kind }
    }
}

#[async_trait]
impl AttrRepo for PgAttrRepo {
    async fn list_owned(&self, owner: Uuid) -> anyhow::Result<Vec<Attr>> {
        let rows = sqlx::query_as::<_, Attr>(&format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 ORDER BY name DESC",
            self.kind.table()
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("list {}", self.kind.table()))?;
        Ok(rows)
    }

    async fn create_owned(&self, owner: Uuid, name: &str) -> anyhow::Result<Attr> {
        let row = sqlx::query_as::<_, Attr>(&format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
            self.kind.table()
        ))
        .bind(owner)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("insert into {}", self.kind.table()))?;
        Ok(row)
    }

    async fn owned_ids(&self, owner: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
            self.kind.table()
        ))
        .bind(owner)
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("check owned {}", self.kind.table()))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const RECIPE_COLUMNS: &str =
    "id, user_id, title, time_minutes, price::FLOAT8 AS price, link, image, created_at";

#[derive(FromRow)]
struct LinkRow {
    recipe_id: Uuid,
    id: Uuid,
    user_id: Uuid,
    name: String,
}

impl PgRecipeRepo {
    async fn links(
        &self,
        kind: AttrKind,
        recipe_ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, Vec<Attr>>> {
        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            SELECT l.recipe_id, a.id, a.user_id, a.name
              FROM {link} l
              JOIN {table} a ON a.id = l.{col}
             WHERE l.recipe_id = ANY($1)
             ORDER BY a.name
            "#,
            link = kind.link_table(),
            table = kind.table(),
            col = kind.link_column(),
        ))
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("load {}", kind.link_table()))?;

        let mut out: HashMap<Uuid, Vec<Attr>> = HashMap::new();
        for r in rows {
            out.entry(r.recipe_id).or_default().push(Attr {
                id: r.id,
                user_id: r.user_id,
                name: r.name,
            });
        }
        Ok(out)
    }

    async fn with_links(&self, rows: Vec<RecipeRow>) -> anyhow::Result<Vec<Recipe>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tags = self.links(AttrKind::Tag, &ids).await?;
        let mut ingredients = self.links(AttrKind::Ingredient, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| Recipe {
                tags: tags.remove(&row.id).unwrap_or_default(),
                ingredients: ingredients.remove(&row.id).unwrap_or_default(),
                row,
            })
            .collect())
    }
}

async fn replace_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: AttrKind,
    recipe_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = $1",
        kind.link_table()
    ))
    .bind(recipe_id)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("clear {}", kind.link_table()))?;

    sqlx::query(&format!(
        "INSERT INTO {link} (recipe_id, {col}) SELECT $1, UNNEST($2::UUID[]) ON CONFLICT DO NOTHING",
        link = kind.link_table(),
        col = kind.link_column(),
    ))
    .bind(recipe_id)
    .bind(ids)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("insert {}", kind.link_table()))?;
    Ok(())
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn list_owned(&self, owner: Uuid) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list recipes")?;
        self.with_links(rows).await
    }

    async fn get_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("get recipe")?;

        match row {
            Some(row) => Ok(self.with_links(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_owned(&self, owner: Uuid, new: NewRecipe) -> anyhow::Result<Recipe> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price, link)
            VALUES ($1, $2, $3, CAST($4 AS NUMERIC(5,2)), $5)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(&new.title)
        .bind(new.time_minutes)
        .bind(new.price)
        .bind(&new.link)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        replace_links_tx(&mut tx, AttrKind::Tag, row.id, &new.tags).await?;
        replace_links_tx(&mut tx, AttrKind::Ingredient, row.id, &new.ingredients).await?;
        tx.commit().await.context("commit tx")?;

        self.get_owned(owner, row.id)
            .await?
            .context("recipe vanished after insert")
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let updated = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE recipes
               SET title = COALESCE($3, title),
                   time_minutes = COALESCE($4, time_minutes),
                   price = COALESCE(CAST($5 AS NUMERIC(5,2)), price),
                   link = COALESCE($6, link)
             WHERE id = $1 AND user_id = $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.title)
        .bind(changes.time_minutes)
        .bind(changes.price)
        .bind(changes.link)
        .fetch_optional(&mut *tx)
        .await
        .context("update recipe")?;

        if updated.is_none() {
            return Ok(None);
        }
        if let Some(tags) = &changes.tags {
            replace_links_tx(&mut tx, AttrKind::Tag, id, tags).await?;
        }
        if let Some(ingredients) = &changes.ingredients {
            replace_links_tx(&mut tx, AttrKind::Ingredient, id, ingredients).await?;
        }
        tx.commit().await.context("commit tx")?;

        self.get_owned(owner, id).await
    }

    async fn set_image(&self, owner: Uuid, id: Uuid, path: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .bind(path)
            .execute(&self.db)
            .await
            .context("set recipe image")?;
        Ok(res.rows_affected() == 1)
    }
}
