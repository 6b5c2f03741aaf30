pub mod config;
pub mod cookbook;
pub mod database;
pub mod errors;
pub mod llm;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod voice;

pub use cookbook::Cookbook;
pub use database::{BlobStore, Database, MemoryStore};
pub use errors::{KitchenError, KitchenResult, ModelError};
pub use llm::{GeminiClient, KitchenAi, StructuredModel, StructuredRequest};
pub use pipeline::{Kitchen, Session, Stage};
