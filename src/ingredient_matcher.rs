//! # Ingredient Matcher
//!
//! Reconciles the ingredient mentions returned by the AI against the catalog.
//!
//! Only exact matches are accepted: the mention's `name` against catalog names
//! (case-sensitive), then the mention's alternate name lowercased against the
//! catalog's lowercased alternate names. A near miss is always unmatched;
//! unmatched mentions go through the resolution workflow, while a wrong match
//! would silently put the wrong ingredient in a recipe.

use std::collections::HashMap;

use crate::cocktail_model::{CatalogIngredient, IngredientMention, RecipeLine};

/// A mention bound to its catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedIngredient {
    pub mention: IngredientMention,
    pub ingredient: CatalogIngredient,
}

/// Partition of the input mentions; every mention lands in exactly one list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    /// Matched mentions, in input order
    pub matched: Vec<MatchedIngredient>,
    /// Unmatched mentions, in input order
    pub unmatched: Vec<IngredientMention>,
}

impl MatchResult {
    pub fn total(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn is_fully_matched(&self) -> bool {
        self.unmatched.is_empty()
    }

    /// Recipe lines for the matched mentions only, in match order
    pub fn to_recipe_lines(&self) -> Vec<RecipeLine> {
        self.matched
            .iter()
            .enumerate()
            .map(|(index, item)| {
                RecipeLine::new(&item.ingredient.id, item.mention.amount.as_deref(), index as i32)
            })
            .collect()
    }
}

/// Lookup table over a catalog snapshot
struct CatalogIndex<'a> {
    by_key: HashMap<String, &'a CatalogIngredient>,
}

impl<'a> CatalogIndex<'a> {
    fn build(catalog: &'a [CatalogIngredient]) -> Self {
        let mut by_key = HashMap::with_capacity(catalog.len() * 2);

        for ingredient in catalog {
            by_key.insert(ingredient.name.clone(), ingredient);

            if let Some(name_alt) = &ingredient.name_alt {
                by_key.insert(name_alt.to_lowercase(), ingredient);
            }
        }

        Self { by_key }
    }

    fn lookup(&self, mention: &IngredientMention) -> Option<&'a CatalogIngredient> {
        if let Some(found) = self.by_key.get(&mention.name) {
            return Some(*found);
        }

        mention
            .name_alt
            .as_ref()
            .and_then(|name_alt| self.by_key.get(&name_alt.to_lowercase()))
            .copied()
    }
}

/// Match `mentions` against a point-in-time `catalog` snapshot.
///
/// Pure and deterministic: the same inputs always produce the same partition
/// in the same order.
pub fn match_ingredients(
    mentions: &[IngredientMention],
    catalog: &[CatalogIngredient],
) -> MatchResult {
    let index = CatalogIndex::build(catalog);
    let mut result = MatchResult::default();

    for mention in mentions {
        match index.lookup(mention) {
            Some(ingredient) => result.matched.push(MatchedIngredient {
                mention: mention.clone(),
                ingredient: ingredient.clone(),
            }),
            None => result.unmatched.push(mention.clone()),
        }
    }

    result
}
