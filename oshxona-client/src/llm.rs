use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use itertools::Itertools;
use oshxona::{Ingredient, Language, Recipe};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::errors::ModelError;
use crate::schema;

/// Base64 image payload sent inline with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            mime_type: image_mime(bytes).to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Sniff the image format from its header. Unknown formats are sent as JPEG.
pub fn image_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg")
}

/// One schema-constrained generation request.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub schema: serde_json::Value,
}

/// A generative model that can answer with JSON constrained to a schema.
#[async_trait]
pub trait StructuredModel: Send + Sync {
    /// Returns the raw response text, empty when the model produced nothing.
    async fn generate(&self, request: StructuredRequest) -> Result<String, ModelError>;
}

#[async_trait]
impl<M: StructuredModel + ?Sized> StructuredModel for std::sync::Arc<M> {
    async fn generate(&self, request: StructuredRequest) -> Result<String, ModelError> {
        (**self).generate(request).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate. Blocked or empty answers give "".
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).join(""))
            .unwrap_or_default()
    }
}

/// `generateContent` over HTTPS.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl StructuredModel for GeminiClient {
    async fn generate(&self, request: StructuredRequest) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let mut parts = vec![];
        if let Some(image) = request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type,
                    data: image.data,
                },
            });
        }
        parts.push(Part::Text {
            text: request.prompt,
        });
        let body = GeminiRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.schema,
            },
        };

        tracing::info!("Calling {}", request.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Model request failed: {}", e);
                ModelError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Model API error: {} - {}", status, body);
            return Err(ModelError::Status { status, body });
        }

        let raw = response.text().await?;
        let envelope: GeminiResponse = serde_json::from_str(&raw)?;
        Ok(envelope.text())
    }
}

/// Send a structured request and decode the answer as a list of `T`.
///
/// Transport failures propagate. Empty or malformed answers decode to an empty
/// list, and so does a list with any element failing `is_valid`.
pub async fn structured_request<T, M>(
    model: &M,
    request: StructuredRequest,
    is_valid: fn(&T) -> bool,
) -> Result<Vec<T>, ModelError>
where
    T: DeserializeOwned,
    M: StructuredModel + ?Sized,
{
    let text = model.generate(request).await?;
    Ok(decode_list(&text, is_valid))
}

pub fn decode_list<T: DeserializeOwned>(text: &str, is_valid: fn(&T) -> bool) -> Vec<T> {
    let text = text.trim();
    if text.is_empty() {
        tracing::warn!("Model returned an empty response");
        return vec![];
    }
    match serde_json::from_str::<Vec<T>>(text) {
        Ok(items) if items.iter().all(is_valid) => items,
        Ok(_) => {
            tracing::warn!("Model response has out-of-range values, discarding it");
            vec![]
        }
        Err(e) => {
            tracing::warn!("Could not decode model response: {}", e);
            tracing::debug!("Response: {}", text);
            vec![]
        }
    }
}

/// Make recipe ids unique within one result set by suffixing repeats.
fn dedupe_ids(recipes: &mut [Recipe]) {
    let mut seen = HashSet::new();
    for recipe in recipes.iter_mut() {
        if !seen.insert(recipe.id.clone()) {
            let mut n = 2;
            while seen.contains(&format!("{}-{}", recipe.id, n)) {
                n += 1;
            }
            recipe.id = format!("{}-{}", recipe.id, n);
            seen.insert(recipe.id.clone());
        }
    }
}

/// The two calls the kitchen makes: ingredient detection and recipe suggestion.
pub struct KitchenAi<M> {
    model: M,
    vision_model: String,
    recipe_model: String,
}

impl<M: StructuredModel> KitchenAi<M> {
    pub fn new(model: M, config: &ModelConfig) -> Self {
        Self {
            model,
            vision_model: config.vision_model.clone(),
            recipe_model: config.recipe_model.clone(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Identify ingredients in a photo, with names in `language`.
    pub async fn classify_ingredients(
        &self,
        image: &InlineImage,
        language: Language,
    ) -> Result<Vec<Ingredient>, ModelError> {
        let prompt = include_str!("prompts/detect-ingredients.md")
            .replace("{language}", language.name());
        tracing::debug!("Prompt: {}", prompt);
        structured_request(
            &self.model,
            StructuredRequest {
                model: self.vision_model.clone(),
                prompt,
                image: Some(image.clone()),
                schema: schema::ingredients_schema(),
            },
            Ingredient::is_valid,
        )
        .await
    }

    /// Ask for two recipes using `ingredients`, honoring the free-text `preferences`.
    pub async fn suggest_recipes(
        &self,
        ingredients: &[String],
        language: Language,
        preferences: &str,
    ) -> Result<Vec<Recipe>, ModelError> {
        if ingredients.is_empty() {
            return Ok(vec![]);
        }
        let prompt = include_str!("prompts/suggest-recipes.md")
            .replace("{ingredients}", &ingredients.join(", "))
            .replace("{language}", language.name())
            .replace("{preferences}", preferences);
        tracing::debug!("Prompt: {}", prompt);
        let mut recipes = structured_request(
            &self.model,
            StructuredRequest {
                model: self.recipe_model.clone(),
                prompt,
                image: None,
                schema: schema::recipes_schema(),
            },
            Recipe::is_valid,
        )
        .await?;
        dedupe_ids(&mut recipes);
        Ok(recipes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned answers and records every request it receives.
    #[derive(Default)]
    pub struct ScriptedModel {
        pub answers: Mutex<VecDeque<Result<String, ModelError>>>,
        pub requests: Mutex<Vec<StructuredRequest>>,
    }

    impl ScriptedModel {
        pub fn answering(answers: Vec<Result<String, ModelError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl StructuredModel for ScriptedModel {
        async fn generate(&self, request: StructuredRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn unavailable() -> ModelError {
        ModelError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "overloaded".into(),
        }
    }

    const TOMATO: &str = r#"[{"name":"tomato","confidence":0.9,"nutrition":{"calories":18,"protein":0.9,"carbs":3.9,"fat":0.2}}]"#;

    #[tokio::test]
    async fn classify_sends_image_and_schema() {
        let ai = KitchenAi::new(
            ScriptedModel::answering(vec![Ok(TOMATO.into())]),
            &ModelConfig::default(),
        );
        let image = InlineImage::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]);
        let found = ai.classify_ingredients(&image, Language::En).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "tomato");

        let requests = ai.model.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.model, "gemini-3-flash-preview");
        assert!(request.prompt.contains("English"));
        assert_eq!(request.image.as_ref().unwrap().mime_type, "image/jpeg");
        assert_eq!(request.schema["type"], "ARRAY");
    }

    #[tokio::test]
    async fn garbage_and_empty_answers_mean_no_ingredients() {
        let ai = KitchenAi::new(
            ScriptedModel::answering(vec![Ok("".into()), Ok("not json".into())]),
            &ModelConfig::default(),
        );
        let image = InlineImage::from_bytes(b"raw");
        assert!(ai.classify_ingredients(&image, Language::Uz).await.unwrap().is_empty());
        assert!(ai.classify_ingredients(&image, Language::Uz).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_field_rejects_the_whole_list() {
        let answer = r#"[
            {"name":"tomato","confidence":0.9,"nutrition":{"calories":18,"protein":0.9,"carbs":3.9,"fat":0.2}},
            {"name":"onion","confidence":0.8,"nutrition":{"calories":40,"protein":1.1,"carbs":9.3}}
        ]"#;
        let ai = KitchenAi::new(
            ScriptedModel::answering(vec![Ok(answer.into())]),
            &ModelConfig::default(),
        );
        let found = ai
            .classify_ingredients(&InlineImage::from_bytes(b"x"), Language::En)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let ai = KitchenAi::new(
            ScriptedModel::answering(vec![Err(unavailable())]),
            &ModelConfig::default(),
        );
        let err = ai
            .suggest_recipes(&["tomato".into()], Language::En, "")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Status { .. }));
    }

    #[tokio::test]
    async fn suggest_fills_prompt_and_dedupes_ids() {
        let answer = r#"[
            {"id":"r1","title":"A","time":"5 min","difficulty":"easy","ingredients":["tomato"],"instructions":["cut"],"nutrition":{"calories":50,"protein":1,"carbs":8,"fat":1}},
            {"id":"r1","title":"B","time":"9 min","difficulty":"easy","ingredients":["tomato"],"instructions":["boil"],"nutrition":{"calories":70,"protein":2,"carbs":9,"fat":2},"culturalNote":"Summer dish"}
        ]"#;
        let ai = KitchenAi::new(
            ScriptedModel::answering(vec![Ok(answer.into())]),
            &ModelConfig::default(),
        );
        let recipes = ai
            .suggest_recipes(
                &["tomato".into(), "onion".into()],
                Language::Ru,
                "vegan, halal",
            )
            .await
            .unwrap();
        assert_eq!(
            recipes.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            ["r1", "r1-2"]
        );

        let requests = ai.model.requests.lock().unwrap();
        let prompt = &requests[0].prompt;
        assert!(prompt.contains("tomato, onion"));
        assert!(prompt.contains("Russian"));
        assert!(prompt.contains("Preferences: vegan, halal."));
        assert!(requests[0].image.is_none());
    }

    #[tokio::test]
    async fn one_bad_recipe_rejects_the_whole_answer() {
        let good = r#"{"id":"r1","title":"A","time":"5 min","difficulty":"easy","ingredients":["tomato"],"instructions":["cut"],"nutrition":{"calories":50,"protein":1,"carbs":8,"fat":1}}"#;
        let no_instructions = r#"{"id":"r2","title":"B","time":"9 min","difficulty":"easy","ingredients":["tomato"],"nutrition":{"calories":70,"protein":2,"carbs":9,"fat":2}}"#;
        let negative_fat = r#"{"id":"r3","title":"C","time":"9 min","difficulty":"easy","ingredients":["tomato"],"instructions":["boil"],"nutrition":{"calories":70,"protein":2,"carbs":9,"fat":-2}}"#;
        let ai = KitchenAi::new(
            ScriptedModel::answering(vec![
                Ok(format!("[{good},{no_instructions}]")),
                Ok(format!("[{good},{negative_fat}]")),
                Ok(format!("[{good}]")),
            ]),
            &ModelConfig::default(),
        );
        let tomato = ["tomato".to_string()];
        for _ in 0..2 {
            let recipes = ai.suggest_recipes(&tomato, Language::En, "").await.unwrap();
            assert!(recipes.is_empty());
        }
        let recipes = ai.suggest_recipes(&tomato, Language::En, "").await.unwrap();
        assert_eq!(recipes.len(), 1);
    }

    #[tokio::test]
    async fn no_ingredients_means_no_call() {
        let ai = KitchenAi::new(ScriptedModel::default(), &ModelConfig::default());
        let recipes = ai.suggest_recipes(&[], Language::En, "").await.unwrap();
        assert!(recipes.is_empty());
        assert!(ai.model.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn envelope_text_joins_parts_of_first_candidate() {
        let envelope: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"[{\"a\":"},{"text":"1}]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.text(), r#"[{"a":1}]"#);

        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(blocked.text(), "");
    }

    #[test]
    fn data_url_keeps_sniffed_mime() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let image = InlineImage::from_bytes(&png);
        assert!(image.to_data_url().starts_with("data:image/png;base64,"));
    }
}
