/// A command recognized in the voice stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Intent {
    /// Open the image picker.
    PickImage,
    /// Generate recipes from the current ingredients.
    GenerateRecipes,
}

const PICK_IMAGE_WORDS: &[&str] = &["upload", "photo", "rasm", "yuklash", "загруз", "фото"];
const GENERATE_WORDS: &[&str] = &["recipe", "retsept", "рецепт"];

/// Find the intents mentioned in one transcript fragment, case-insensitively.
pub fn scan(fragment: &str) -> Vec<Intent> {
    let text = fragment.to_lowercase();
    let mut found = vec![];
    if PICK_IMAGE_WORDS.iter().any(|w| text.contains(w)) {
        found.push(Intent::PickImage);
    }
    if GENERATE_WORDS.iter().any(|w| text.contains(w)) {
        found.push(Intent::GenerateRecipes);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_in_all_three_languages() {
        assert_eq!(scan("Please UPLOAD a picture"), [Intent::PickImage]);
        assert_eq!(scan("Rasm yuklash"), [Intent::PickImage]);
        assert_eq!(scan("Загрузить фото"), [Intent::PickImage]);
        assert_eq!(scan("Retsept yaratish!"), [Intent::GenerateRecipes]);
        assert_eq!(scan("Создать РЕЦЕПТ"), [Intent::GenerateRecipes]);
    }

    #[test]
    fn both_or_neither() {
        assert_eq!(
            scan("upload a photo, then give me a recipe"),
            [Intent::PickImage, Intent::GenerateRecipes]
        );
        assert!(scan("what a lovely day").is_empty());
    }
}
