use anyhow::Result;
use handlebars::Handlebars;
use oshxona::{Ingredient, Recipe, Translation};
use serde_json::json;

lazy_static::lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        for (name, template) in [
            ("ingredients", include_str!("templates/ingredients.hbs")),
            ("recipe", include_str!("templates/recipe.hbs")),
        ] {
            hb.register_template_string(name, template)
                .expect("Failed to register template");
        }
        hb
    };
}

/// Round model estimates for display.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn ingredients(ingredients: &[Ingredient], t: &Translation) -> Result<String> {
    let items = ingredients
        .iter()
        .map(|i| {
            json!({
                "name": i.name,
                "calories": round1(i.nutrition.calories),
                "confidence": (i.confidence * 100.0).round() as i64,
            })
        })
        .collect::<Vec<_>>();
    Ok(TEMPLATES.render(
        "ingredients",
        &json!({
            "labels": { "detected": t.detected_ingredients },
            "count": ingredients.len(),
            "ingredients": items,
        }),
    )?)
}

pub fn recipe(recipe: &Recipe, saved: bool, t: &Translation) -> Result<String> {
    let steps = recipe
        .instructions
        .iter()
        .enumerate()
        .map(|(i, text)| json!({ "n": i + 1, "text": text }))
        .collect::<Vec<_>>();
    Ok(TEMPLATES.render(
        "recipe",
        &json!({
            "labels": {
                "protein": t.protein,
                "carbs": t.carbs,
                "fats": t.fats,
                "ingredients": t.ingredients_label,
                "instructions": t.instructions_label,
                "note": t.cultural_hint,
            },
            "saved": saved,
            "id": recipe.id,
            "title": recipe.title,
            "time": recipe.time,
            "difficulty": recipe.difficulty,
            "nutrition": {
                "calories": round1(recipe.nutrition.calories),
                "protein": round1(recipe.nutrition.protein),
                "carbs": round1(recipe.nutrition.carbs),
                "fat": round1(recipe.nutrition.fat),
            },
            "ingredients": recipe.ingredients,
            "steps": steps,
            "note": recipe.cultural_note,
        }),
    )?)
}
