//! # Recipe Response Parser
//!
//! Turns the raw text returned by the model into a [`CocktailRecipe`].
//!
//! Models frequently wrap JSON in a markdown code fence, so a leading
//! ```` ```json ```` / ```` ``` ```` and a trailing ```` ``` ```` are stripped
//! before parsing. The `{"error": "unknown_cocktail"}` sentinel is reported as
//! [`ParsedRecipe::UnknownCocktail`], which is a valid negative answer and never
//! a [`RecipeParseError`].

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cocktail_model::CocktailRecipe;
use crate::prompts::UNKNOWN_COCKTAIL_SENTINEL;

/// Number of characters of the offending text kept for diagnostics
pub const SNIPPET_LENGTH: usize = 100;

lazy_static! {
    static ref SLUG_REGEX: Regex =
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Slug pattern should be valid");
}

/// Outcome of parsing a model response
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecipe {
    Recipe(CocktailRecipe),
    /// The model does not know the requested cocktail
    UnknownCocktail,
}

/// The response could not be turned into a recipe
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipeParseError {
    #[error("PARSE_ERROR: response is not valid JSON: {snippet}...")]
    InvalidJson { snippet: String },
    #[error("PARSE_ERROR: response does not match the recipe shape ({reason}): {snippet}...")]
    InvalidShape { reason: String, snippet: String },
}

impl RecipeParseError {
    /// Leading characters of the text that failed to parse
    pub fn snippet(&self) -> &str {
        match self {
            RecipeParseError::InvalidJson { snippet } => snippet,
            RecipeParseError::InvalidShape { snippet, .. } => snippet,
        }
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let mut json = text.trim();

    if let Some(rest) = json.strip_prefix("```json") {
        json = rest;
    } else if let Some(rest) = json.strip_prefix("```") {
        json = rest;
    }

    if let Some(rest) = json.strip_suffix("```") {
        json = rest;
    }

    json.trim()
}

fn snippet_of(text: &str) -> String {
    text.chars().take(SNIPPET_LENGTH).collect()
}

fn is_unknown_sentinel(value: &Value) -> bool {
    value
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|error| error == UNKNOWN_COCKTAIL_SENTINEL)
}

/// Parse a raw model response into a recipe or the unknown-cocktail signal
pub fn parse_recipe(raw: &str) -> Result<ParsedRecipe, RecipeParseError> {
    let json = strip_code_fence(raw);

    let value: Value = serde_json::from_str(json).map_err(|e| {
        warn!(error = %e, "Model response is not valid JSON");
        RecipeParseError::InvalidJson {
            snippet: snippet_of(json),
        }
    })?;

    if is_unknown_sentinel(&value) {
        debug!("Model reported an unknown cocktail");
        return Ok(ParsedRecipe::UnknownCocktail);
    }

    let invalid_shape = |reason: String| RecipeParseError::InvalidShape {
        reason,
        snippet: snippet_of(json),
    };

    if let Some(pct) = value.get("alcohol_percentage").and_then(Value::as_i64) {
        if !(0..=100).contains(&pct) {
            return Err(invalid_shape(format!("alcohol_percentage {pct} is outside 0..=100")));
        }
    }

    let recipe: CocktailRecipe = serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Model response does not match the recipe shape");
        invalid_shape(e.to_string())
    })?;

    if !SLUG_REGEX.is_match(&recipe.slug) {
        return Err(invalid_shape(format!("invalid slug {:?}", recipe.slug)));
    }

    if recipe.ingredients.iter().any(|i| i.name.trim().is_empty()) {
        return Err(invalid_shape("ingredient with blank name".to_string()));
    }

    debug!(
        cocktail = %recipe.name,
        ingredients = recipe.ingredients.len(),
        "Parsed recipe response"
    );

    Ok(ParsedRecipe::Recipe(recipe))
}
