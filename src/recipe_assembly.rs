//! # Recipe Assembly
//!
//! Merges matched and resolved ingredients into the ordered recipe lines that
//! get persisted. Matched ingredients come first in their original order, and
//! resolved ones follow in resolution order. Sort orders are always 0-based
//! and dense.

use crate::cocktail_model::RecipeLine;
use crate::ingredient_matcher::MatchedIngredient;
use crate::ingredient_resolution::ResolvedIngredient;

/// Build the recipe lines for one cocktail.
///
/// Amounts are copied verbatim; no unit normalization is attempted.
pub fn assemble_recipe_lines(
    matched: &[MatchedIngredient],
    resolved: &[ResolvedIngredient],
) -> Vec<RecipeLine> {
    let matched_lines = matched
        .iter()
        .map(|item| (item.ingredient.id.as_str(), item.mention.amount.as_deref()));
    let resolved_lines = resolved
        .iter()
        .map(|item| (item.ingredient_id.as_str(), item.amount.as_deref()));

    matched_lines
        .chain(resolved_lines)
        .enumerate()
        .map(|(index, (ingredient_id, amount))| {
            RecipeLine::new(ingredient_id, amount, index as i32)
        })
        .collect()
}

/// Reassign sort orders 0..n following the current order of `lines`
pub fn renumber(lines: &mut [RecipeLine]) {
    for (index, line) in lines.iter_mut().enumerate() {
        line.sort_order = index as i32;
    }
}

/// Remove the line at `index` and close the gap; `None` when out of range
pub fn remove_line(lines: &mut Vec<RecipeLine>, index: usize) -> Option<RecipeLine> {
    if index >= lines.len() {
        return None;
    }
    let removed = lines.remove(index);
    renumber(lines);
    Some(removed)
}

/// Move the line at `from` to position `to`; returns false when either is out of range
pub fn move_line(lines: &mut Vec<RecipeLine>, from: usize, to: usize) -> bool {
    if from >= lines.len() || to >= lines.len() {
        return false;
    }
    let line = lines.remove(from);
    lines.insert(to, line);
    renumber(lines);
    true
}

/// Whether sort orders are exactly 0..n in slice order
pub fn is_dense(lines: &[RecipeLine]) -> bool {
    lines
        .iter()
        .enumerate()
        .all(|(index, line)| line.sort_order == index as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cocktail_model::{CatalogIngredient, IngredientMention};

    fn matched(id: &str, amount: Option<&str>) -> MatchedIngredient {
        let mut ingredient = CatalogIngredient::new(id, None, None);
        ingredient.id = id.to_string();
        let mut mention = IngredientMention::new(id);
        mention.amount = amount.map(str::to_string);
        MatchedIngredient { mention, ingredient }
    }

    fn resolved(id: &str, amount: Option<&str>, created: bool) -> ResolvedIngredient {
        ResolvedIngredient {
            original_name: id.to_string(),
            ingredient_id: id.to_string(),
            amount: amount.map(str::to_string),
            is_newly_created: created,
        }
    }

    fn ids(lines: &[RecipeLine]) -> Vec<&str> {
        lines.iter().map(|l| l.ingredient_id.as_str()).collect()
    }

    #[test]
    fn test_matched_first_then_resolved() {
        let lines = assemble_recipe_lines(
            &[matched("gin", Some("45ml")), matched("tonic", Some("適量"))],
            &[
                resolved("mint", None, true),
                resolved("lime", Some("1/6個"), false),
                resolved("sugar", Some("1tsp"), true),
            ],
        );

        assert_eq!(lines.iter().map(|l| l.sort_order).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(ids(&lines), vec!["gin", "tonic", "mint", "lime", "sugar"]);
        assert_eq!(lines[1].amount.as_deref(), Some("適量"));
        assert_eq!(lines[2].amount, None);
        assert_eq!(lines[3].amount.as_deref(), Some("1/6個"));
    }

    #[test]
    fn test_only_resolved() {
        let lines =
            assemble_recipe_lines(&[], &[resolved("a", None, true), resolved("b", None, true)]);
        assert_eq!(lines, vec![RecipeLine::new("a", None, 0), RecipeLine::new("b", None, 1)]);
    }

    #[test]
    fn test_empty() {
        assert!(assemble_recipe_lines(&[], &[]).is_empty());
    }

    #[test]
    fn test_remove_line_redensifies() {
        let mut lines = assemble_recipe_lines(
            &[matched("a", None), matched("b", None), matched("c", None)],
            &[resolved("d", None, false)],
        );

        let removed = remove_line(&mut lines, 1).unwrap();
        assert_eq!(removed.ingredient_id, "b");
        assert_eq!(ids(&lines), vec!["a", "c", "d"]);
        assert!(is_dense(&lines));

        assert!(remove_line(&mut lines, 3).is_none());
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_move_line_redensifies() {
        let mut lines = assemble_recipe_lines(
            &[matched("a", None), matched("b", None), matched("c", None)],
            &[],
        );

        assert!(move_line(&mut lines, 2, 0));
        assert_eq!(ids(&lines), vec!["c", "a", "b"]);
        assert!(is_dense(&lines));

        assert!(!move_line(&mut lines, 0, 3));
        assert_eq!(ids(&lines), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_renumber_and_is_dense() {
        let mut lines = vec![RecipeLine::new("x", None, 4), RecipeLine::new("y", None, 9)];
        assert!(!is_dense(&lines));
        renumber(&mut lines);
        assert!(is_dense(&lines));
        assert_eq!(lines[1].sort_order, 1);
    }
}
