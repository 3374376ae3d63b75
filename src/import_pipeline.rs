//! # Cocktail Import Pipeline
//!
//! Drives one import from a cocktail name to stored records:
//!
//! 1. [`CocktailImporter::fetch_draft`] validates the name, generates the
//!    recipe and matches its ingredients against a catalog snapshot.
//! 2. The caller decides a resolution for every unmatched mention.
//! 3. [`CocktailImporter::finalize`] resolves them and assembles the lines.
//!    After a partial failure, [`CocktailImporter::finalize_remaining`]
//!    retries only the items that were not resolved yet.
//! 4. [`CocktailImporter::save`] writes the cocktail and its recipe lines in
//!    one transaction.
//!
//! Image generation is a separate, optional step.

use std::fmt;

use fluent_bundle::{FluentArgs, FluentValue};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai_client::{GenerativeTransport, RetryingAiClient};
use crate::ai_errors::AiError;
use crate::cocktail_model::{CocktailRecipe, RecipeLine};
use crate::config::{ImportConfig, StorageConfig};
use crate::db::{CocktailStore, DbError, DeletedCocktail, IngredientCatalog};
use crate::ingredient_matcher::{match_ingredients, MatchResult};
use crate::ingredient_resolution::{
    resume_unmatched, IngredientResolution, ResolutionError, ResolvedIngredient,
};
use crate::localization::LocalizationManager;
use crate::prompts::{build_image_prompt, build_recipe_prompt};
use crate::recipe_assembly::assemble_recipe_lines;
use crate::recipe_parser::{parse_recipe, ParsedRecipe, RecipeParseError};
use crate::storage::{remove_image_by_url, store_base64_image, ObjectStorage, StorageError};

/// Result of the fetch step
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDraft {
    /// A recipe with its ingredients partitioned against the catalog
    Ready { recipe: CocktailRecipe, matches: MatchResult },
    /// The AI does not know a cocktail by that name
    UnknownCocktail { name: String },
}

/// Recipe ready to be saved
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedImport {
    pub recipe: CocktailRecipe,
    /// Dense, matched lines first
    pub lines: Vec<RecipeLine>,
    /// Catalog entries created while resolving
    pub newly_created: usize,
}

/// Why a cocktail name was rejected before any request was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameIssue {
    Blank,
    TooLong { max: usize },
}

impl fmt::Display for NameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameIssue::Blank => write!(f, "cocktail name must not be blank"),
            NameIssue::TooLong { max } => {
                write!(f, "cocktail name must be at most {} characters", max)
            }
        }
    }
}

/// Import failures
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid cocktail name: {0}")]
    InvalidName(NameIssue),
    #[error("expected {expected} resolutions, got {actual}")]
    ResolutionCountMismatch { expected: usize, actual: usize },
    #[error("cocktail \"{name}\" is already registered")]
    DuplicateCocktail { name: String },
    #[error("no cocktail named \"{name}\" is known")]
    UnknownCocktail { name: String },
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Parse(#[from] RecipeParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Closed classification of import failures, one user message each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportErrorKind {
    Validation,
    Duplicate,
    UnknownCocktail,
    RateLimited,
    Unauthorized,
    MalformedResponse,
    ApiError,
    Storage,
    Database,
}

impl ImportErrorKind {
    pub const ALL: [ImportErrorKind; 9] = [
        ImportErrorKind::Validation,
        ImportErrorKind::Duplicate,
        ImportErrorKind::UnknownCocktail,
        ImportErrorKind::RateLimited,
        ImportErrorKind::Unauthorized,
        ImportErrorKind::MalformedResponse,
        ImportErrorKind::ApiError,
        ImportErrorKind::Storage,
        ImportErrorKind::Database,
    ];

    /// Localization key of the user-facing message
    pub fn message_key(self) -> &'static str {
        match self {
            ImportErrorKind::Validation => "import-error-validation",
            ImportErrorKind::Duplicate => "import-error-duplicate",
            ImportErrorKind::UnknownCocktail => "import-error-unknown-cocktail",
            ImportErrorKind::RateLimited => "import-error-rate-limited",
            ImportErrorKind::Unauthorized => "import-error-unauthorized",
            ImportErrorKind::MalformedResponse => "import-error-malformed-response",
            ImportErrorKind::ApiError => "import-error-api",
            ImportErrorKind::Storage => "import-error-storage",
            ImportErrorKind::Database => "import-error-database",
        }
    }
}

impl ImportError {
    pub fn kind(&self) -> ImportErrorKind {
        match self {
            ImportError::InvalidName(_) | ImportError::ResolutionCountMismatch { .. } => {
                ImportErrorKind::Validation
            }
            ImportError::DuplicateCocktail { .. } => ImportErrorKind::Duplicate,
            ImportError::UnknownCocktail { .. } => ImportErrorKind::UnknownCocktail,
            ImportError::Ai(AiError::RateLimit) => ImportErrorKind::RateLimited,
            ImportError::Ai(AiError::Unauthorized { .. }) => ImportErrorKind::Unauthorized,
            ImportError::Ai(e) if e.is_malformed_response() => ImportErrorKind::MalformedResponse,
            ImportError::Ai(_) => ImportErrorKind::ApiError,
            ImportError::Parse(_) => ImportErrorKind::MalformedResponse,
            ImportError::Resolution(ResolutionError::Invalid { .. }) => {
                ImportErrorKind::Validation
            }
            ImportError::Resolution(ResolutionError::CreationFailed { source, .. }) => {
                db_kind(source)
            }
            ImportError::Storage(_) => ImportErrorKind::Storage,
            ImportError::Database(e) => db_kind(e),
        }
    }

    /// Catalog entries that were created before the failure and kept
    pub fn newly_created_count(&self) -> usize {
        match self {
            ImportError::Resolution(e) => e.newly_created_count(),
            _ => 0,
        }
    }

    /// Localized message for this failure
    pub fn user_message(&self, localization: &LocalizationManager) -> String {
        let detail = self.to_string();
        let reason = match self {
            ImportError::InvalidName(issue) => issue.to_string(),
            _ => detail.clone(),
        };

        let mut args = FluentArgs::new();
        if let Some(name) = self.subject_name() {
            args.set("name", FluentValue::from(name));
        }
        args.set("reason", FluentValue::from(reason));
        args.set("detail", FluentValue::from(detail));

        let message = localization.get_message(self.kind().message_key(), Some(&args));

        if !matches!(self, ImportError::Resolution(ResolutionError::CreationFailed { .. })) {
            return message;
        }

        let mut partial = FluentArgs::new();
        partial.set("count", FluentValue::from(self.newly_created_count()));
        format!(
            "{}\n{}",
            message,
            localization.get_message("import-error-partial", Some(&partial))
        )
    }

    fn subject_name(&self) -> Option<&str> {
        match self {
            ImportError::DuplicateCocktail { name } | ImportError::UnknownCocktail { name } => {
                Some(name)
            }
            ImportError::Database(
                DbError::DuplicateName { name } | DbError::DuplicateCocktail { name },
            ) => Some(name),
            ImportError::Resolution(ResolutionError::CreationFailed {
                source: DbError::DuplicateName { name },
                ..
            }) => Some(name),
            ImportError::Resolution(e) => Some(e.name()),
            _ => None,
        }
    }
}

fn db_kind(error: &DbError) -> ImportErrorKind {
    match error {
        DbError::DuplicateName { .. } | DbError::DuplicateCocktail { .. } => {
            ImportErrorKind::Duplicate
        }
        DbError::BlankName => ImportErrorKind::Validation,
        DbError::Database(_) => ImportErrorKind::Database,
    }
}

/// Validate and trim a cocktail name
pub fn validate_cocktail_name(name: &str, max_length: usize) -> Result<&str, NameIssue> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NameIssue::Blank);
    }
    if name.chars().count() > max_length {
        return Err(NameIssue::TooLong { max: max_length });
    }
    Ok(name)
}

/// Import orchestration over a catalog `C`, a cocktail store `S` and an AI transport `T`
pub struct CocktailImporter<C, S, T> {
    catalog: C,
    store: S,
    ai: RetryingAiClient<T>,
    config: ImportConfig,
    storage_config: StorageConfig,
}

impl<C, S, T> CocktailImporter<C, S, T>
where
    C: IngredientCatalog,
    S: CocktailStore,
    T: GenerativeTransport,
{
    pub fn new(catalog: C, store: S, ai: RetryingAiClient<T>, config: ImportConfig) -> Self {
        Self {
            catalog,
            store,
            ai,
            config,
            storage_config: StorageConfig::default(),
        }
    }

    pub fn with_storage_config(mut self, storage_config: StorageConfig) -> Self {
        self.storage_config = storage_config;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ai_client(&self) -> &RetryingAiClient<T> {
        &self.ai
    }

    /// Generate and match a recipe for `name`
    pub async fn fetch_draft(&self, name: &str) -> Result<ImportDraft, ImportError> {
        let name = validate_cocktail_name(name, self.config.max_cocktail_name_length)
            .map_err(ImportError::InvalidName)?;

        if self.store.cocktail_name_exists(name).await? {
            info!(cocktail = %name, "Cocktail already registered, skipping generation");
            return Err(ImportError::DuplicateCocktail { name: name.to_string() });
        }

        let catalog = self.catalog.list_ingredients().await?;
        let catalog_names: Vec<String> = if self.config.include_catalog_in_prompt {
            catalog.iter().map(|ingredient| ingredient.name.clone()).collect()
        } else {
            Vec::new()
        };

        info!(cocktail = %name, catalog_size = catalog.len(), "Generating recipe");
        let prompt = build_recipe_prompt(name, &catalog_names);
        let raw = self.ai.generate_recipe_text(&prompt).await?;

        let recipe = match parse_recipe(&raw) {
            Ok(ParsedRecipe::Recipe(recipe)) => recipe,
            Ok(ParsedRecipe::UnknownCocktail) => {
                info!(cocktail = %name, "AI does not know this cocktail");
                return Ok(ImportDraft::UnknownCocktail { name: name.to_string() });
            }
            Err(e) => {
                warn!(
                    cocktail = %name,
                    error = %e,
                    snippet = %e.snippet(),
                    "Unparseable recipe response"
                );
                return Err(e.into());
            }
        };

        let matches = match_ingredients(&recipe.ingredients, &catalog);
        info!(
            cocktail = %recipe.name,
            matched = matches.matched.len(),
            unmatched = matches.unmatched.len(),
            "Recipe generated"
        );

        Ok(ImportDraft::Ready { recipe, matches })
    }

    /// Resolve the unmatched mentions of a ready draft and assemble its recipe lines.
    ///
    /// `resolutions` must hold one entry per unmatched mention, in order.
    pub async fn finalize(
        &self,
        draft: &ImportDraft,
        resolutions: &[IngredientResolution],
    ) -> Result<FinalizedImport, ImportError> {
        self.finalize_remaining(draft, &[], resolutions).await
    }

    /// Finish a draft whose earlier `finalize` stopped on a creation failure.
    ///
    /// `completed` are the items that attempt already resolved (see
    /// [`ResolutionError::completed`]) and `remaining` holds one resolution per
    /// unmatched mention after them, in order. Entries created by the earlier
    /// attempt are reused, never created again.
    pub async fn finalize_remaining(
        &self,
        draft: &ImportDraft,
        completed: &[ResolvedIngredient],
        remaining: &[IngredientResolution],
    ) -> Result<FinalizedImport, ImportError> {
        let (recipe, matches) = match draft {
            ImportDraft::Ready { recipe, matches } => (recipe, matches),
            ImportDraft::UnknownCocktail { name } => {
                return Err(ImportError::UnknownCocktail { name: name.clone() })
            }
        };

        let supplied = completed.len() + remaining.len();
        if supplied != matches.unmatched.len() {
            return Err(ImportError::ResolutionCountMismatch {
                expected: matches.unmatched.len(),
                actual: supplied,
            });
        }

        let outcome = resume_unmatched(&self.catalog, completed, remaining).await?;
        let lines = assemble_recipe_lines(&matches.matched, &outcome.resolved);

        debug!(cocktail = %recipe.name, lines = lines.len(), "Recipe lines assembled");

        Ok(FinalizedImport {
            newly_created: outcome.newly_created_count(),
            recipe: recipe.clone(),
            lines,
        })
    }

    /// Insert the cocktail and its recipe lines atomically; returns the cocktail id
    pub async fn save(
        &self,
        recipe: &CocktailRecipe,
        lines: &[RecipeLine],
        image_url: Option<&str>,
    ) -> Result<String, ImportError> {
        let cocktail_id = self
            .store
            .insert_cocktail_with_lines(recipe, image_url, lines)
            .await?;

        info!(%cocktail_id, cocktail = %recipe.name, lines = lines.len(), "Cocktail imported");
        Ok(cocktail_id)
    }

    /// Generate an image for `recipe` and upload it; returns the public URL
    pub async fn generate_image<O>(
        &self,
        recipe: &CocktailRecipe,
        storage: &O,
    ) -> Result<String, ImportError>
    where
        O: ObjectStorage + ?Sized,
    {
        let prompt = build_image_prompt(&recipe.name, recipe.glass, recipe.color);
        let data = self.ai.generate_image(&prompt).await?;
        let url = store_base64_image(storage, &self.storage_config, &data).await?;

        info!(cocktail = %recipe.name, %url, "Cocktail image generated");
        Ok(url)
    }

    /// Delete a cocktail with its recipe lines, then remove its image
    pub async fn delete_cocktail<O>(
        &self,
        id: &str,
        storage: &O,
    ) -> Result<Option<DeletedCocktail>, ImportError>
    where
        O: ObjectStorage + ?Sized,
    {
        let deleted = self.store.delete_cocktail(id).await?;

        if let Some(url) = deleted.as_ref().and_then(|d| d.image_url.as_deref()) {
            remove_image_by_url(storage, url).await;
        }

        Ok(deleted)
    }
}
