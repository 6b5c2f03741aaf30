use serde_json::json;

fn nutrition_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "calories": { "type": "NUMBER" },
            "protein": { "type": "NUMBER" },
            "carbs": { "type": "NUMBER" },
            "fat": { "type": "NUMBER" }
        },
        "required": ["calories", "protein", "carbs", "fat"]
    })
}

/// Response schema for ingredient detection: an array of ingredients with
/// per-100g nutrition.
pub fn ingredients_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "confidence": { "type": "NUMBER" },
                "nutrition": nutrition_schema()
            },
            "required": ["name", "confidence", "nutrition"]
        }
    })
}

/// Response schema for recipe suggestions. `culturalNote` is optional.
pub fn recipes_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "time": { "type": "STRING" },
                "difficulty": { "type": "STRING" },
                "ingredients": { "type": "ARRAY", "items": { "type": "STRING" } },
                "instructions": { "type": "ARRAY", "items": { "type": "STRING" } },
                "nutrition": nutrition_schema(),
                "culturalNote": { "type": "STRING" }
            },
            "required": ["id", "title", "time", "difficulty", "ingredients", "instructions", "nutrition"]
        }
    })
}
