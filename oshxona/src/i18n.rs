use crate::basic_models::Language;

/// UI labels for one display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub scan_now: &'static str,
    pub detected_ingredients: &'static str,
    pub generate_recipe: &'static str,
    pub processing: &'static str,
    pub nutrition_info: &'static str,
    pub recipes: &'static str,
    pub calories: &'static str,
    pub protein: &'static str,
    pub carbs: &'static str,
    pub fats: &'static str,
    pub ingredients_label: &'static str,
    pub instructions_label: &'static str,
    pub dietary_filters: &'static str,
    pub cultural_hint: &'static str,
    pub voice_prompt: &'static str,
    pub save_recipe: &'static str,
    pub saved: &'static str,
    pub my_cookbook: &'static str,
}

const UZ: Translation = Translation {
    title: "Oshxona Malikasi",
    subtitle: "Aqlli oshxona yordamchisi",
    scan_now: "Masalliqlar rasmini yuklang",
    detected_ingredients: "Aniqlangan masalliqlar",
    generate_recipe: "Retsept yaratish",
    processing: "Tahlil qilinmoqda...",
    nutrition_info: "Ozuqaviy qiymati",
    recipes: "Retseptlar",
    calories: "Kaloriya",
    protein: "Oqsil",
    carbs: "Uglevod",
    fats: "Yog'",
    ingredients_label: "Masalliqlar",
    instructions_label: "Tayyorlash tartibi",
    dietary_filters: "Parhez filtrlari",
    cultural_hint: "Madaniy eslatma",
    voice_prompt: "\"Rasm yuklash\" yoki \"Retsept yaratish\" deng",
    save_recipe: "Saqlash",
    saved: "Saqlandi",
    my_cookbook: "Mening retseptlarim",
};

const EN: Translation = Translation {
    title: "Kitchen Queen",
    subtitle: "Smart kitchen assistant",
    scan_now: "Upload a photo of your ingredients",
    detected_ingredients: "Detected ingredients",
    generate_recipe: "Generate recipes",
    processing: "Analyzing...",
    nutrition_info: "Nutrition",
    recipes: "Recipes",
    calories: "Calories",
    protein: "Protein",
    carbs: "Carbs",
    fats: "Fats",
    ingredients_label: "Ingredients",
    instructions_label: "Instructions",
    dietary_filters: "Dietary filters",
    cultural_hint: "Cultural note",
    voice_prompt: "Say \"upload photo\" or \"generate recipe\"",
    save_recipe: "Save",
    saved: "Saved",
    my_cookbook: "My cookbook",
};

const RU: Translation = Translation {
    title: "Королева кухни",
    subtitle: "Умный кухонный помощник",
    scan_now: "Загрузите фото продуктов",
    detected_ingredients: "Найденные продукты",
    generate_recipe: "Создать рецепт",
    processing: "Анализ...",
    nutrition_info: "Пищевая ценность",
    recipes: "Рецепты",
    calories: "Калории",
    protein: "Белки",
    carbs: "Углеводы",
    fats: "Жиры",
    ingredients_label: "Ингредиенты",
    instructions_label: "Приготовление",
    dietary_filters: "Диетические фильтры",
    cultural_hint: "Культурная заметка",
    voice_prompt: "Скажите \"загрузить фото\" или \"рецепт\"",
    save_recipe: "Сохранить",
    saved: "Сохранено",
    my_cookbook: "Моя кулинарная книга",
};

impl Translation {
    pub fn for_language(language: Language) -> &'static Translation {
        match language {
            Language::Uz => &UZ,
            Language::En => &EN,
            Language::Ru => &RU,
        }
    }
}
