pub mod basic_models;
pub mod i18n;

pub use basic_models::{DietaryFilter, Ingredient, Language, NutritionFacts, Recipe, View};
pub use i18n::Translation;
