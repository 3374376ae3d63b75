//! # Cocktail Catalog
//!
//! AI-assisted cocktail import: generate a structured recipe for a cocktail
//! name, reconcile its ingredients with the catalog, resolve the unknown ones
//! and store the result together with an optional generated image.

pub mod ai_client;
pub mod ai_errors;
pub mod cocktail_model;
pub mod config;
pub mod db;
pub mod import_pipeline;
pub mod ingredient_matcher;
pub mod ingredient_resolution;
pub mod localization;
pub mod prompts;
pub mod recipe_assembly;
pub mod recipe_parser;
pub mod storage;

pub use ai_client::{GenerativeTransport, HttpTransport, RetryingAiClient};
pub use ai_errors::AiError;
pub use cocktail_model::{CatalogIngredient, CocktailRecipe, IngredientMention, RecipeLine};
pub use config::AppConfig;
pub use db::{CocktailStore, DbError, IngredientCatalog, PgStore, RecipeStore};
pub use import_pipeline::{CocktailImporter, ImportDraft, ImportError, ImportErrorKind};
pub use localization::LocalizationManager;
pub use storage::{ObjectStorage, StorageError, SupabaseStorage};
