//! # Unmatched-Ingredient Resolution
//!
//! Every mention the matcher could not bind gets a caller-chosen resolution:
//! bind it to an existing catalog entry, or create a new catalog entry for it.
//!
//! The whole batch is validated before anything is written. Resolutions are
//! then executed strictly one after another; when creating item *k* fails,
//! items `0..k` stay created and are reported back with the error, and items
//! after *k* are never attempted.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cocktail_model::{IngredientCategory, IngredientMention};
use crate::db::{DbError, IngredientCatalog};

/// How an unmatched mention is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Bind to an ingredient already in the catalog
    Existing,
    /// Create a new catalog ingredient
    New,
}

/// Caller's decision for one unmatched mention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientResolution {
    /// The mention being resolved
    pub mention: IngredientMention,
    pub mode: ResolutionMode,
    /// Required in `Existing` mode
    pub existing_id: Option<String>,
    /// Required (non-blank) in `New` mode
    pub new_name: String,
    pub new_category: Option<IngredientCategory>,
}

impl IngredientResolution {
    /// Default resolution: create a new entry named and categorized after the mention
    pub fn for_mention(mention: &IngredientMention) -> Self {
        Self {
            mention: mention.clone(),
            mode: ResolutionMode::New,
            existing_id: None,
            new_name: mention.name.clone(),
            new_category: mention.category,
        }
    }

    /// Bind the mention to an existing catalog entry
    pub fn existing(mention: &IngredientMention, ingredient_id: &str) -> Self {
        Self {
            mode: ResolutionMode::Existing,
            existing_id: Some(ingredient_id.to_string()),
            ..Self::for_mention(mention)
        }
    }

    /// Create a new catalog entry under an edited name and category
    pub fn create(
        mention: &IngredientMention,
        name: &str,
        category: Option<IngredientCategory>,
    ) -> Self {
        Self {
            new_name: name.to_string(),
            new_category: category,
            ..Self::for_mention(mention)
        }
    }

    pub fn validate(&self) -> Result<(), ValidationIssue> {
        match self.mode {
            ResolutionMode::Existing => match self.existing_id.as_deref() {
                Some(id) if !id.trim().is_empty() => Ok(()),
                _ => Err(ValidationIssue::MissingExistingId),
            },
            ResolutionMode::New if self.new_name.trim().is_empty() => {
                Err(ValidationIssue::BlankNewName)
            }
            ResolutionMode::New => Ok(()),
        }
    }
}

/// Why a resolution is invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingExistingId,
    BlankNewName,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingExistingId => write!(f, "select an existing ingredient"),
            ValidationIssue::BlankNewName => write!(f, "enter a name for the new ingredient"),
        }
    }
}

/// A mention bound to a catalog id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIngredient {
    pub original_name: String,
    pub ingredient_id: String,
    /// Copied verbatim from the mention
    pub amount: Option<String>,
    pub is_newly_created: bool,
}

/// Successful batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolutionOutcome {
    /// One entry per resolution, in resolution order
    pub resolved: Vec<ResolvedIngredient>,
}

impl ResolutionOutcome {
    pub fn newly_created_count(&self) -> usize {
        count_created(&self.resolved)
    }
}

fn count_created(resolved: &[ResolvedIngredient]) -> usize {
    resolved.iter().filter(|r| r.is_newly_created).count()
}

/// Failed batch
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Rejected before any catalog write
    #[error("ingredient #{} \"{name}\": {issue}", .index + 1)]
    Invalid {
        index: usize,
        name: String,
        issue: ValidationIssue,
    },
    /// Creating the entry for item `index` failed; earlier items were committed
    #[error("ingredient #{} \"{name}\" could not be created: {source}", .index + 1)]
    CreationFailed {
        index: usize,
        name: String,
        #[source]
        source: DbError,
        /// Items resolved before the failure, in order
        completed: Vec<ResolvedIngredient>,
    },
}

impl ResolutionError {
    /// 0-based index of the offending resolution
    pub fn index(&self) -> usize {
        match self {
            ResolutionError::Invalid { index, .. } => *index,
            ResolutionError::CreationFailed { index, .. } => *index,
        }
    }

    /// Mention name of the offending resolution
    pub fn name(&self) -> &str {
        match self {
            ResolutionError::Invalid { name, .. } => name,
            ResolutionError::CreationFailed { name, .. } => name,
        }
    }

    /// Items already resolved (and, for new entries, already created)
    pub fn completed(&self) -> &[ResolvedIngredient] {
        match self {
            ResolutionError::Invalid { .. } => &[],
            ResolutionError::CreationFailed { completed, .. } => completed,
        }
    }

    pub fn newly_created_count(&self) -> usize {
        count_created(self.completed())
    }

    /// Re-base an error from a resumed batch onto the full batch: shift the
    /// index past `earlier` and put `earlier` in front of the completed items
    fn after(self, earlier: &[ResolvedIngredient]) -> Self {
        match self {
            ResolutionError::Invalid { index, name, issue } => ResolutionError::Invalid {
                index: index + earlier.len(),
                name,
                issue,
            },
            ResolutionError::CreationFailed {
                index,
                name,
                source,
                completed,
            } => ResolutionError::CreationFailed {
                index: index + earlier.len(),
                name,
                source,
                completed: earlier.iter().cloned().chain(completed).collect(),
            },
        }
    }
}

/// Check every resolution; the first invalid one rejects the batch
pub fn validate_resolutions(resolutions: &[IngredientResolution]) -> Result<(), ResolutionError> {
    for (index, resolution) in resolutions.iter().enumerate() {
        if let Err(issue) = resolution.validate() {
            warn!(
                index,
                ingredient = %resolution.mention.name,
                %issue,
                "Invalid ingredient resolution"
            );
            return Err(ResolutionError::Invalid {
                index,
                name: resolution.mention.name.clone(),
                issue,
            });
        }
    }
    Ok(())
}

/// Validate, then execute the resolutions in order against `catalog`
pub async fn resolve_unmatched<C>(
    catalog: &C,
    resolutions: &[IngredientResolution],
) -> Result<ResolutionOutcome, ResolutionError>
where
    C: IngredientCatalog + ?Sized,
{
    validate_resolutions(resolutions)?;

    let mut resolved = Vec::with_capacity(resolutions.len());

    for (index, resolution) in resolutions.iter().enumerate() {
        let mention = &resolution.mention;

        let entry = match resolution.mode {
            ResolutionMode::Existing => {
                let ingredient_id = resolution.existing_id.clone().unwrap_or_default();
                debug!(
                    index,
                    ingredient = %mention.name,
                    %ingredient_id,
                    "Binding to existing ingredient"
                );
                ResolvedIngredient {
                    original_name: mention.name.clone(),
                    ingredient_id,
                    amount: mention.amount.clone(),
                    is_newly_created: false,
                }
            }
            ResolutionMode::New => {
                let created = catalog
                    .create_ingredient(
                        resolution.new_name.trim(),
                        mention.name_alt.as_deref(),
                        resolution.new_category,
                    )
                    .await;

                match created {
                    Ok(ingredient) => {
                        info!(
                            index,
                            ingredient = %ingredient.name,
                            id = %ingredient.id,
                            "Created catalog ingredient"
                        );
                        ResolvedIngredient {
                            original_name: mention.name.clone(),
                            ingredient_id: ingredient.id,
                            amount: mention.amount.clone(),
                            is_newly_created: true,
                        }
                    }
                    Err(source) => {
                        warn!(
                            index,
                            ingredient = %mention.name,
                            error = %source,
                            "Stopping resolution batch"
                        );
                        return Err(ResolutionError::CreationFailed {
                            index,
                            name: mention.name.clone(),
                            source,
                            completed: resolved,
                        });
                    }
                }
            }
        };

        resolved.push(entry);
    }

    let outcome = ResolutionOutcome { resolved };
    info!(
        resolved = outcome.resolved.len(),
        created = outcome.newly_created_count(),
        "Resolved unmatched ingredients"
    );
    Ok(outcome)
}

/// Continue a batch that stopped on a creation failure.
///
/// `completed` are the items the failed attempt already resolved
/// ([`ResolutionError::completed`]); `remaining` covers the items from the
/// failed one onwards. The outcome, and any new error, spans the whole batch.
pub async fn resume_unmatched<C>(
    catalog: &C,
    completed: &[ResolvedIngredient],
    remaining: &[IngredientResolution],
) -> Result<ResolutionOutcome, ResolutionError>
where
    C: IngredientCatalog + ?Sized,
{
    if !completed.is_empty() {
        info!(
            completed = completed.len(),
            remaining = remaining.len(),
            "Resuming resolution batch"
        );
    }

    let outcome = resolve_unmatched(catalog, remaining)
        .await
        .map_err(|e| e.after(completed))?;

    let mut resolved = completed.to_vec();
    resolved.extend(outcome.resolved);
    Ok(ResolutionOutcome { resolved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::MemoryCatalog;

    fn mention(name: &str, amount: Option<&str>) -> IngredientMention {
        let mention = IngredientMention::new(name).with_name_alt(&format!("{name} (en)"));
        match amount {
            Some(amount) => mention.with_amount(amount),
            None => mention,
        }
    }

    #[tokio::test]
    async fn test_mixed_batch_resolves_in_order() {
        let catalog = MemoryCatalog::with_names(&["ジン"]);
        let gin_id = catalog.id_of("ジン").unwrap();
        let resolutions = vec![
            IngredientResolution::for_mention(&mention("ミント", Some("6枚"))),
            IngredientResolution::existing(&mention("ドライジン", Some("45ml")), &gin_id),
            IngredientResolution::create(
                &mention("シュガー", None),
                "  砂糖 ",
                Some(IngredientCategory::Syrup),
            ),
        ];

        let outcome = resolve_unmatched(&catalog, &resolutions).await.unwrap();

        assert_eq!(outcome.resolved.len(), 3);
        assert_eq!(outcome.newly_created_count(), 2);

        assert_eq!(outcome.resolved[0].original_name, "ミント");
        assert_eq!(outcome.resolved[0].amount.as_deref(), Some("6枚"));
        assert!(outcome.resolved[0].is_newly_created);

        assert_eq!(outcome.resolved[1].ingredient_id, gin_id);
        assert!(!outcome.resolved[1].is_newly_created);

        let sugar = catalog.get(&outcome.resolved[2].ingredient_id).unwrap();
        assert_eq!(sugar.name, "砂糖");
        assert_eq!(sugar.name_alt.as_deref(), Some("シュガー (en)"));
        assert_eq!(sugar.category, Some(IngredientCategory::Syrup));
        assert!(!sugar.is_searchable);

        assert_eq!(catalog.create_calls(), vec!["ミント".to_string(), "砂糖".to_string()]);
    }

    #[tokio::test]
    async fn test_validation_failure_aborts_before_any_creation() {
        let catalog = MemoryCatalog::default();
        let mut missing_id = IngredientResolution::for_mention(&mention("ドライジン", None));
        missing_id.mode = ResolutionMode::Existing;

        let resolutions = vec![
            IngredientResolution::for_mention(&mention("ミント", None)),
            missing_id,
            IngredientResolution::for_mention(&mention("ソーダ", None)),
        ];

        let err = resolve_unmatched(&catalog, &resolutions).await.unwrap_err();

        assert!(matches!(
            err,
            ResolutionError::Invalid {
                index: 1,
                issue: ValidationIssue::MissingExistingId,
                ..
            }
        ));
        assert_eq!(err.name(), "ドライジン");
        assert!(catalog.create_calls().is_empty());
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_blank_new_name_is_invalid() {
        let catalog = MemoryCatalog::default();
        let resolutions = vec![IngredientResolution::create(&mention("ミント", None), "   ", None)];

        let err = resolve_unmatched(&catalog, &resolutions).await.unwrap_err();
        assert_eq!(err.index(), 0);
        assert!(err.to_string().contains("enter a name"));
        assert!(catalog.create_calls().is_empty());
    }

    #[tokio::test]
    async fn test_creation_failure_stops_batch() {
        let catalog = MemoryCatalog::with_names(&["ソーダ"]);
        let resolutions = vec![
            IngredientResolution::for_mention(&mention("ミント", None)),
            IngredientResolution::for_mention(&mention("ソーダ", Some("適量"))),
            IngredientResolution::for_mention(&mention("砂糖", None)),
        ];

        let err = resolve_unmatched(&catalog, &resolutions).await.unwrap_err();

        match &err {
            ResolutionError::CreationFailed {
                index,
                name,
                source,
                completed,
            } => {
                assert_eq!(*index, 1);
                assert_eq!(name, "ソーダ");
                assert_eq!(
                    *source,
                    DbError::DuplicateName {
                        name: "ソーダ".to_string()
                    }
                );
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].original_name, "ミント");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.newly_created_count(), 1);
        assert!(err.to_string().contains("#2"));

        // the third item is never attempted
        assert_eq!(catalog.create_calls(), vec!["ミント".to_string(), "ソーダ".to_string()]);
        assert!(catalog.id_of("ミント").is_some());
        assert!(catalog.id_of("砂糖").is_none());
    }

    #[tokio::test]
    async fn test_resume_after_creation_failure() {
        let catalog = MemoryCatalog::with_names(&["ソーダ"]);
        let mentions = [
            mention("ミント", Some("6枚")),
            mention("ソーダ", Some("適量")),
            mention("砂糖", None),
        ];
        let resolutions: Vec<_> = mentions.iter().map(IngredientResolution::for_mention).collect();
        let err = resolve_unmatched(&catalog, &resolutions).await.unwrap_err();

        let soda_id = catalog.id_of("ソーダ").unwrap();
        let remaining = vec![
            IngredientResolution::existing(&mentions[1], &soda_id),
            IngredientResolution::for_mention(&mentions[2]),
        ];
        let outcome = resume_unmatched(&catalog, err.completed(), &remaining)
            .await
            .unwrap();

        let names: Vec<&str> = outcome.resolved.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(names, vec!["ミント", "ソーダ", "砂糖"]);
        assert_eq!(outcome.resolved[1].ingredient_id, soda_id);
        assert_eq!(outcome.newly_created_count(), 2);
        // ミント is not created a second time
        assert_eq!(
            catalog.create_calls(),
            vec!["ミント".to_string(), "ソーダ".to_string(), "砂糖".to_string()]
        );
    }

    #[tokio::test]
    async fn test_resume_failure_spans_whole_batch() {
        let catalog = MemoryCatalog::with_names(&["砂糖"]);
        let earlier = vec![ResolvedIngredient {
            original_name: "ミント".to_string(),
            ingredient_id: "mint".to_string(),
            amount: None,
            is_newly_created: true,
        }];
        let remaining = vec![
            IngredientResolution::for_mention(&mention("ソーダ", None)),
            IngredientResolution::for_mention(&mention("砂糖", None)),
        ];

        let err = resume_unmatched(&catalog, &earlier, &remaining)
            .await
            .unwrap_err();

        assert_eq!(err.index(), 2);
        assert_eq!(err.name(), "砂糖");
        let completed: Vec<&str> =
            err.completed().iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(completed, vec!["ミント", "ソーダ"]);
        assert_eq!(err.newly_created_count(), 2);
    }

    #[tokio::test]
    async fn test_existing_only_batch_creates_nothing() {
        let catalog = MemoryCatalog::default();
        let resolutions = vec![
            IngredientResolution::existing(&mention("A", None), "id-a"),
            IngredientResolution::existing(&mention("B", Some("1 dash")), "id-b"),
        ];

        let outcome = resolve_unmatched(&catalog, &resolutions).await.unwrap();
        assert_eq!(outcome.newly_created_count(), 0);
        assert_eq!(outcome.resolved[1].amount.as_deref(), Some("1 dash"));
        assert!(catalog.create_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let catalog = MemoryCatalog::default();
        let outcome = resolve_unmatched(&catalog, &[]).await.unwrap();
        assert_eq!(outcome, ResolutionOutcome::default());
    }

    #[test]
    fn test_default_resolution_is_new_with_mention_fields() {
        let source = IngredientMention::new("ミント").with_category(IngredientCategory::Herb);
        let resolution = IngredientResolution::for_mention(&source);
        assert_eq!(resolution.mode, ResolutionMode::New);
        assert_eq!(resolution.new_name, "ミント");
        assert_eq!(resolution.new_category, Some(IngredientCategory::Herb));
        assert!(resolution.validate().is_ok());
    }

    #[test]
    fn test_existing_with_blank_id_is_invalid() {
        let resolution = IngredientResolution::existing(&IngredientMention::new("ミント"), " ");
        assert_eq!(resolution.validate(), Err(ValidationIssue::MissingExistingId));
    }
}
