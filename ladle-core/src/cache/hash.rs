//! Canonical content fingerprint.

use sha2::{Digest, Sha256};

use crate::text::clean_text;
use crate::types::ImportedRecipe;

/// Hash the recipe's content into an identity fingerprint.
///
/// Title, ingredient lines and step texts are lowercased and
/// whitespace-collapsed, joined with newlines in that fixed order, and
/// digested with SHA-256. Payloads differing only in case or spacing
/// hash identically, so URL variants of the same recipe share a
/// canonical group.
pub fn canonical_hash(recipe: &ImportedRecipe) -> String {
    let mut parts: Vec<String> = vec![clean_text(&recipe.title.to_lowercase())];
    for line in recipe.ingredient_lines() {
        parts.push(clean_text(&line.to_lowercase()));
    }
    for step in &recipe.steps {
        parts.push(clean_text(&step.text.to_lowercase()));
    }

    let mut hasher = Sha256::new();
    hasher.update(parts.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}
