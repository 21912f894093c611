//! Quality scoring, the comparison rule and the freshness decision.

use chrono::{DateTime, Duration, Utc};

use crate::types::{GlobalRecipe, ImportedRecipe};

/// Cached entries scoring below this are refetched regardless of age.
pub const QUALITY_MIN_SCORE: i32 = 70;

/// Days a complete, good-enough entry is trusted without refetching.
pub const FRESH_DAYS: i64 = 30;

/// Result of scoring an extracted payload.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    pub score: i32,
    pub is_complete: bool,
    pub missing_fields: Vec<String>,
}

/// Score an extracted payload.
///
/// Completeness is strictly "ingredients AND steps present" and is
/// independent of the numeric score.
pub fn score_recipe(recipe: &ImportedRecipe) -> QualityAssessment {
    let mut score = 0;
    let mut missing_fields = Vec::new();

    if recipe.title.trim().is_empty() {
        missing_fields.push("title".to_string());
    } else {
        score += 10;
    }

    if recipe
        .description
        .as_deref()
        .map(|d| !d.trim().is_empty())
        .unwrap_or(false)
    {
        score += 10;
    }

    if recipe.has_ingredients() {
        score += 35;
    } else {
        missing_fields.push("ingredients".to_string());
    }

    if recipe.has_steps() {
        score += 35;
    } else {
        missing_fields.push("steps".to_string());
    }

    if recipe.nutrition.calories.is_some() {
        score += 10;
    }

    QualityAssessment {
        score,
        is_complete: recipe.has_ingredients() && recipe.has_steps(),
        missing_fields,
    }
}

/// The comparison rule: is a refetch result better than the cached one?
///
/// Completeness dominates the numeric score, so a confident-but-partial
/// extraction never displaces a weaker-but-complete one.
pub fn is_better(new: &QualityAssessment, existing: &GlobalRecipe) -> bool {
    if existing.is_complete && !new.is_complete {
        return false;
    }
    if new.is_complete && !existing.is_complete {
        return true;
    }
    new.score > existing.quality_score
}

/// Decide whether a cached entry must be refetched.
pub fn should_reimport(existing: &GlobalRecipe, now: DateTime<Utc>) -> bool {
    if !existing.is_complete {
        return true;
    }
    if existing.quality_score < QUALITY_MIN_SCORE {
        return true;
    }
    match existing.last_fetched_at {
        None => true,
        Some(fetched_at) => now - fetched_at > Duration::days(FRESH_DAYS),
    }
}
