use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Display language for model output and UI labels.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[default]
    Uz,
    En,
    Ru,
}

impl Language {
    /// English name of the language, used when instructing the model.
    pub fn name(self) -> &'static str {
        match self {
            Language::Uz => "Uzbek",
            Language::En => "English",
            Language::Ru => "Russian",
        }
    }
}

/// Model-estimated nutrition. Per 100g on an ingredient, whole dish on a recipe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl NutritionFacts {
    pub fn is_valid(&self) -> bool {
        [self.calories, self.protein, self.carbs, self.fat]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub confidence: f64,
    pub nutrition: NutritionFacts,
}

impl Ingredient {
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence) && self.nutrition.is_valid()
    }
}

/// A suggested dish. The JSON shape is shared by the model response and the
/// persisted cookbook blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub time: String,
    pub difficulty: String,
    pub ingredients: Vec<String>,
    /// Steps in execution order.
    pub instructions: Vec<String>,
    pub nutrition: NutritionFacts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_note: Option<String>,
}

impl Recipe {
    pub fn is_valid(&self) -> bool {
        self.nutrition.is_valid()
    }
}

/// Dietary tags offered by the front end. Selected filters are kept as free
/// strings; this list only drives display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DietaryFilter {
    Vegan,
    GlutenFree,
    NutFree,
    Halal,
}

impl DietaryFilter {
    pub fn id(self) -> &'static str {
        self.into()
    }

    pub fn label(self, language: Language) -> &'static str {
        use DietaryFilter::*;
        use Language::*;
        match (self, language) {
            (Vegan, Uz) | (Vegan, En) => "Vegan",
            (Vegan, Ru) => "Веган",
            (GlutenFree, Uz) => "Glutensiz",
            (GlutenFree, En) => "Gluten-free",
            (GlutenFree, Ru) => "Без глютена",
            (NutFree, Uz) => "Yong’oqsiz",
            (NutFree, En) => "Nut-free",
            (NutFree, Ru) => "Без орехов",
            (Halal, Uz) => "Halol",
            (Halal, En) => "Halal",
            (Halal, Ru) => "Халяль",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum View {
    #[default]
    Home,
    Cookbook,
}
