//! Structured extraction: deterministic schema.org parsing with a
//! model-call fallback, converging every platform's signals into
//! [`crate::types::ImportedRecipe`].

mod llm;
mod page;
mod schema;

pub use llm::structure_signals;
pub use page::{page_meta, visible_text, PageMeta, MAX_PAGE_TEXT_CHARS};
pub use schema::{extract_og_image, extract_schema_recipe};

use crate::types::ImportedRecipe;

/// Tie-break between two candidate extractions of the same source: the
/// one with strictly more total ingredients+steps wins, first on ties.
pub fn pick_richer(a: ImportedRecipe, b: ImportedRecipe) -> ImportedRecipe {
    if b.signal_count() > a.signal_count() {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ingredients_from_lines, steps_from_lines};

    #[test]
    fn richer_candidate_wins_ties_to_first() {
        let a = ImportedRecipe {
            title: "A".into(),
            ingredients: ingredients_from_lines(["x", "y"]),
            ..Default::default()
        };
        let b = ImportedRecipe {
            title: "B".into(),
            steps: steps_from_lines(["1", "2"]),
            ..Default::default()
        };
        // Equal counts: first argument wins.
        assert_eq!(pick_richer(a.clone(), b).title, "A");

        let richer = ImportedRecipe {
            title: "C".into(),
            ingredients: ingredients_from_lines(["x", "y", "z"]),
            ..Default::default()
        };
        assert_eq!(pick_richer(a, richer).title, "C");
    }
}
