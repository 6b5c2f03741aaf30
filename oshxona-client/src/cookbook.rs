use anyhow::Result;
use oshxona::Recipe;

use crate::database::BlobStore;

/// The user's saved recipes, unique by id, persisted as one JSON blob.
pub struct Cookbook<S> {
    store: S,
    key: String,
    recipes: Vec<Recipe>,
}

impl<S: BlobStore> Cookbook<S> {
    /// Read the cookbook. Unreadable or corrupt storage gives an empty cookbook.
    pub fn load(store: S, key: &str) -> Self {
        let recipes = match store.load(key) {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                tracing::warn!("Cookbook blob {} is corrupt, starting empty: {}", key, e);
                vec![]
            }),
            Ok(None) => vec![],
            Err(e) => {
                tracing::warn!("Could not read cookbook {}, starting empty: {:#}", key, e);
                vec![]
            }
        };
        tracing::debug!("Loaded {} saved recipes", recipes.len());
        Self {
            store,
            key: key.to_string(),
            recipes,
        }
    }

    pub fn list(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.recipes.iter().any(|r| r.id == id)
    }

    /// Append `recipe` unless its id is already saved. Returns whether it was added.
    pub fn save(&mut self, recipe: Recipe) -> Result<bool> {
        if self.contains(&recipe.id) {
            return Ok(false);
        }
        tracing::info!("Saving recipe {} to the cookbook", recipe.id);
        let mut recipes = self.recipes.clone();
        recipes.push(recipe);
        self.replace(recipes)?;
        Ok(true)
    }

    /// Delete the recipe with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        if !self.contains(id) {
            return Ok(false);
        }
        tracing::info!("Removing recipe {} from the cookbook", id);
        let recipes = self
            .recipes
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();
        self.replace(recipes)?;
        Ok(true)
    }

    /// Write `recipes` to the store, then adopt them. A failed write leaves
    /// the cookbook as it was.
    fn replace(&mut self, recipes: Vec<Recipe>) -> Result<()> {
        let blob = serde_json::to_string(&recipes)?;
        self.store.save(&self.key, &blob)?;
        self.recipes = recipes;
        Ok(())
    }
}
