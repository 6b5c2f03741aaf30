//! The acquisition pipeline: photo → ingredients → recipes → cookbook.
//!
//! [`Kitchen`] owns all session state and only changes it through the
//! transition methods below. Every mutation happens before or after a model
//! call, never across one, so the shell and the voice channel can both drive
//! the same kitchen without seeing half-applied state.

use oshxona::{Ingredient, Language, Recipe, View};

use crate::cookbook::Cookbook;
use crate::database::BlobStore;
use crate::errors::{KitchenError, KitchenResult};
use crate::llm::{InlineImage, KitchenAi, StructuredModel};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    #[default]
    Idle,
    Detecting,
    IngredientsReady,
    Generating,
    RecipesReady,
}

impl Stage {
    /// A model call is in flight.
    pub fn is_loading(self) -> bool {
        matches!(self, Stage::Detecting | Stage::Generating)
    }
}

/// Read-only view of the transient session.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Session {
    stage: Stage,
    language: Language,
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    preview: Option<String>,
    filters: Vec<String>,
    view: View,
    error: Option<String>,
}

impl Session {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_loading(&self) -> bool {
        self.stage.is_loading()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Data URL of the submitted photo.
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Selected dietary tags, in the order they were selected.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Last failure worth showing to the user.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Free-text preference hint for the recipe call.
    pub fn preference_hint(&self) -> String {
        self.filters.join(", ")
    }

    pub fn can_request_recipes(&self) -> bool {
        !self.ingredients.is_empty() && !self.is_loading()
    }

    /// Drop the photo and everything derived from it. Preferences stay.
    fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.ingredients.clear();
        self.recipes.clear();
        self.preview = None;
        self.error = None;
    }
}

pub struct Kitchen<M, S> {
    ai: KitchenAi<M>,
    cookbook: Cookbook<S>,
    session: Session,
}

impl<M: StructuredModel, S: BlobStore> Kitchen<M, S> {
    pub fn new(ai: KitchenAi<M>, cookbook: Cookbook<S>, language: Language) -> Self {
        Self {
            ai,
            cookbook,
            session: Session {
                language,
                ..Default::default()
            },
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Classify a new photo. Valid from any stage.
    ///
    /// Previously generated recipes are discarded whatever the outcome. A
    /// failed call still lands in `IngredientsReady`, with no ingredients and
    /// the failure recorded in the session.
    pub async fn submit_image(&mut self, image_bytes: &[u8]) -> KitchenResult<&[Ingredient]> {
        let image = InlineImage::from_bytes(image_bytes);
        let language = self.session.language;
        self.session.stage = Stage::Detecting;
        self.session.preview = Some(image.to_data_url());
        self.session.recipes.clear();
        self.session.error = None;

        let detected = self.ai.classify_ingredients(&image, language).await;

        self.session.stage = Stage::IngredientsReady;
        match detected {
            Ok(ingredients) => {
                tracing::info!("Detected {} ingredients", ingredients.len());
                self.session.ingredients = ingredients;
                Ok(&self.session.ingredients)
            }
            Err(e) => {
                tracing::error!("Ingredient detection failed: {}", e);
                self.session.ingredients.clear();
                self.session.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Ask for recipes from the current ingredients.
    ///
    /// Returns `Ok(false)` without touching anything when there are no
    /// ingredients or a call is already pending.
    pub async fn request_recipes(&mut self) -> KitchenResult<bool> {
        if !self.session.can_request_recipes() {
            tracing::debug!(
                "Ignoring recipe request in stage {} with {} ingredients",
                self.session.stage,
                self.session.ingredients.len()
            );
            return Ok(false);
        }
        let names = self
            .session
            .ingredients
            .iter()
            .map(|i| i.name.clone())
            .collect::<Vec<_>>();
        let language = self.session.language;
        let preferences = self.session.preference_hint();
        self.session.stage = Stage::Generating;
        self.session.error = None;

        let suggested = self
            .ai
            .suggest_recipes(&names, language, &preferences)
            .await;

        match suggested {
            Ok(recipes) => {
                tracing::info!("Received {} recipes", recipes.len());
                self.session.recipes = recipes;
                self.session.stage = Stage::RecipesReady;
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Recipe suggestion failed: {}", e);
                self.session.recipes.clear();
                self.session.stage = Stage::IngredientsReady;
                self.session.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Select or deselect a dietary tag. Returns whether it is now selected.
    /// Only future recipe requests see the change.
    pub fn toggle_filter(&mut self, tag: &str) -> bool {
        let filters = &mut self.session.filters;
        if let Some(pos) = filters.iter().position(|f| f == tag) {
            filters.remove(pos);
            false
        } else {
            filters.push(tag.to_string());
            true
        }
    }

    /// Switch the display language. Already fetched results keep their language.
    pub fn change_language(&mut self, language: Language) {
        self.session.language = language;
    }

    pub fn show_view(&mut self, view: View) {
        self.session.view = view;
    }

    /// Back to `Idle`, discarding photo, ingredients and recipes together.
    pub fn clear(&mut self) {
        self.session.reset();
    }

    /// Recover after a pending call was dropped before finishing.
    ///
    /// Detection falls back to `Idle`, generation to `IngredientsReady`.
    /// Returns whether there was anything to abandon.
    pub fn abandon_pending(&mut self) -> bool {
        match self.session.stage {
            Stage::Detecting => {
                self.session.reset();
                true
            }
            Stage::Generating => {
                self.session.recipes.clear();
                self.session.stage = Stage::IngredientsReady;
                true
            }
            _ => false,
        }
    }

    pub fn saved_recipes(&self) -> &[Recipe] {
        self.cookbook.list()
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.cookbook.contains(id)
    }

    /// Save one of the current results. Saving an already saved id is a no-op.
    pub fn save_recipe(&mut self, id: &str) -> KitchenResult<bool> {
        let recipe = self
            .session
            .recipes
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| KitchenError::UnknownRecipe(id.to_string()))?;
        Ok(self.cookbook.save(recipe)?)
    }

    pub fn remove_saved(&mut self, id: &str) -> KitchenResult<bool> {
        Ok(self.cookbook.remove(id)?)
    }

    /// Save if unsaved, remove if saved. Returns whether it is saved afterwards.
    pub fn toggle_saved(&mut self, id: &str) -> KitchenResult<bool> {
        if self.is_saved(id) {
            self.remove_saved(id)?;
            Ok(false)
        } else {
            self.save_recipe(id)?;
            Ok(true)
        }
    }
}
