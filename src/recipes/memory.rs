use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Attr, AttrKind, NewRecipe, Recipe, RecipeChanges, RecipeRow};
use super::repo::{AttrRepo, RecipeRepo};

#[derive(Default)]
struct Tables {
    tags: Vec<Attr>,
    ingredients: Vec<Attr>,
    // insertion order; links are kept as id lists on the side
    recipes: Vec<(RecipeRow, Vec<Uuid>, Vec<Uuid>)>,
}

impl Tables {
    fn attrs(&self, kind: AttrKind) -> &Vec<Attr> {
        match kind {
            AttrKind::Tag => &self.tags,
            AttrKind::Ingredient => &self.ingredients,
        }
    }

    fn resolve(&self, kind: AttrKind, ids: &[Uuid]) -> Vec<Attr> {
        let mut out: Vec<Attr> = self
            .attrs(kind)
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn recipe(&self, entry: &(RecipeRow, Vec<Uuid>, Vec<Uuid>)) -> Recipe {
        Recipe {
            row: entry.0.clone(),
            tags: self.resolve(AttrKind::Tag, &entry.1),
            ingredients: self.resolve(AttrKind::Ingredient, &entry.2),
        }
    }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Shared in-memory tables backing the test repositories.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn attrs(&self, kind: AttrKind) -> MemoryAttrRepo {
        MemoryAttrRepo {
            store: self.clone(),
            kind,
        }
    }

    pub fn recipes(&self) -> MemoryRecipeRepo {
        MemoryRecipeRepo {
            store: self.clone(),
        }
    }
}

pub struct MemoryAttrRepo {
    store: MemoryStore,
    kind: AttrKind,
}

#[async_trait]
impl AttrRepo for MemoryAttrRepo {
    async fn list_owned(&self, owner: Uuid) -> anyhow::Result<Vec<Attr>> {
        let t = self.store.tables.lock().unwrap();
        let mut out: Vec<Attr> = t
            .attrs(self.kind)
            .iter()
            .filter(|a| a.user_id == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(out)
    }

    async fn create_owned(&self, owner: Uuid, name: &str) -> anyhow::Result<Attr> {
        let mut t = self.store.tables.lock().unwrap();
        let attr = Attr {
            id: Uuid::new_v4(),
            user_id: owner,
            name: name.to_string(),
        };
        match self.kind {
            AttrKind::Tag => t.tags.push(attr.clone()),
            AttrKind::Ingredient => t.ingredients.push(attr.clone()),
        }
        Ok(attr)
    }

    async fn owned_ids(&self, owner: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let t = self.store.tables.lock().unwrap();
        Ok(t.attrs(self.kind)
            .iter()
            .filter(|a| a.user_id == owner && ids.contains(&a.id))
            .map(|a| a.id)
            .collect())
    }
}

pub struct MemoryRecipeRepo {
    store: MemoryStore,
}

#[async_trait]
impl RecipeRepo for MemoryRecipeRepo {
    async fn list_owned(&self, owner: Uuid) -> anyhow::Result<Vec<Recipe>> {
        let t = self.store.tables.lock().unwrap();
        Ok(t.recipes
            .iter()
            .rev()
            .filter(|e| e.0.user_id == owner)
            .map(|e| t.recipe(e))
            .collect())
    }

    async fn get_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let t = self.store.tables.lock().unwrap();
        Ok(t.recipes
            .iter()
            .find(|e| e.0.id == id && e.0.user_id == owner)
            .map(|e| t.recipe(e)))
    }

    async fn create_owned(&self, owner: Uuid, new: NewRecipe) -> anyhow::Result<Recipe> {
        let mut t = self.store.tables.lock().unwrap();
        let row = RecipeRow {
            id: Uuid::new_v4(),
            user_id: owner,
            title: new.title,
            time_minutes: new.time_minutes,
            price: (new.price * 100.0).round() / 100.0,
            link: new.link,
            image: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let entry = (row, dedup(new.tags), dedup(new.ingredients));
        let recipe = t.recipe(&entry);
        t.recipes.push(entry);
        Ok(recipe)
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut t = self.store.tables.lock().unwrap();
        let Some(pos) = t
            .recipes
            .iter()
            .position(|e| e.0.id == id && e.0.user_id == owner)
        else {
            return Ok(None);
        };
        let entry = &mut t.recipes[pos];
        if let Some(title) = changes.title {
            entry.0.title = title;
        }
        if let Some(minutes) = changes.time_minutes {
            entry.0.time_minutes = minutes;
        }
        if let Some(price) = changes.price {
            entry.0.price = (price * 100.0).round() / 100.0;
        }
        if let Some(link) = changes.link {
            entry.0.link = link;
        }
        if let Some(tags) = changes.tags {
            entry.1 = dedup(tags);
        }
        if let Some(ingredients) = changes.ingredients {
            entry.2 = dedup(ingredients);
        }
        Ok(Some(t.recipe(&t.recipes[pos])))
    }

    async fn set_image(&self, owner: Uuid, id: Uuid, path: &str) -> anyhow::Result<bool> {
        let mut t = self.store.tables.lock().unwrap();
        match t
            .recipes
            .iter_mut()
            .find(|e| e.0.id == id && e.0.user_id == owner)
        {
            Some(entry) => {
                entry.0.image = Some(path.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
