//! Data model for imported recipes and cache rows.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::text::clean_text;

/// A structured recipe as produced by an import chain, before any
/// persistence. Field aliases match the camelCase payloads emitted by
/// model calls and schema.org markup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImportedRecipe {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "mealType")]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub servings: Option<String>,
    #[serde(default, alias = "prepTime")]
    pub prep_time: Option<String>,
    #[serde(default, alias = "cookTime")]
    pub cook_time: Option<String>,
    #[serde(default, alias = "totalTime")]
    pub total_time: Option<String>,
    #[serde(default)]
    pub nutrition: Nutrition,
    #[serde(default, alias = "chefNotes")]
    pub chef_notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<ImportedIngredient>,
    #[serde(default, alias = "instructions")]
    pub steps: Vec<InstructionStep>,
    /// Platform label, e.g. "web", "tiktok", "youtube".
    #[serde(default, alias = "sourcePlatform")]
    pub source_platform: Option<String>,
    #[serde(default, alias = "sourceUrl")]
    pub source_url: Option<String>,
    #[serde(default, alias = "sourceDomain")]
    pub source_domain: Option<String>,
    /// Which mechanism produced this payload, e.g. "schema_org" or
    /// "yt-dlp+whisper+openai".
    #[serde(default, alias = "extractedVia")]
    pub extracted_via: Option<String>,
    #[serde(default, alias = "mediaVideoUrl")]
    pub media_video_url: Option<String>,
    #[serde(default, alias = "mediaImageUrl")]
    pub media_image_url: Option<String>,
    #[serde(default, alias = "mediaLocalPath")]
    pub media_local_path: Option<PathBuf>,
    #[serde(default)]
    pub metadata: RecipeMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImportedIngredient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: Option<String>,
    /// The original unparsed line, kept for display and hashing.
    #[serde(default, alias = "originalLine")]
    pub line: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InstructionStep {
    #[serde(default, alias = "stepNumber")]
    pub step_number: u32,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Nutrition {
    #[serde(default)]
    pub calories: Option<String>,
    #[serde(default)]
    pub protein: Option<String>,
    #[serde(default)]
    pub carbs: Option<String>,
    #[serde(default)]
    pub fat: Option<String>,
}

/// Non-recipe bookkeeping that rides along with a payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecipeMetadata {
    /// Core fields the extraction could not fill.
    #[serde(default, alias = "missingFields")]
    pub missing_fields: Vec<String>,
    /// Extractor self-reported confidence, 0.0..=1.0.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// User-visible note, e.g. when a transcription budget ran out.
    #[serde(default)]
    pub disclaimer: Option<String>,
    /// Resolved outbound link for pin-board imports.
    #[serde(default, alias = "destinationUrl")]
    pub destination_url: Option<String>,
    #[serde(default, alias = "destinationDomain")]
    pub destination_domain: Option<String>,
    /// Further "visit website" link found on the destination page.
    #[serde(default, alias = "websiteUrl")]
    pub website_url: Option<String>,
    /// Model/transcription calls spent on this import.
    #[serde(default)]
    pub usage: Vec<UsageEvent>,
}

/// One external provider call, recorded for cost accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageEvent {
    /// Pipeline stage that made the call, e.g. "web_llm", "whisper_chunk".
    pub stage: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub audio_seconds: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl UsageEvent {
    pub fn model_call(stage: &str, provider: &str, model: &str) -> Self {
        UsageEvent {
            stage: stage.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens: None,
            output_tokens: None,
            audio_seconds: None,
            created_at: Utc::now(),
        }
    }

    pub fn transcription(stage: &str, provider: &str, model: &str, audio_seconds: u64) -> Self {
        UsageEvent {
            audio_seconds: Some(audio_seconds),
            ..Self::model_call(stage, provider, model)
        }
    }
}

impl ImportedRecipe {
    pub fn has_ingredients(&self) -> bool {
        !self.ingredients.is_empty()
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// A payload with neither ingredients nor steps is an extraction
    /// failure, never stored.
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty() && self.steps.is_empty()
    }

    /// Total ingredient and step count, the tie-break between candidate
    /// extractions of the same source.
    pub fn signal_count(&self) -> usize {
        self.ingredients.len() + self.steps.len()
    }

    /// All ingredient text, preferring the raw line over the parsed name.
    pub fn ingredient_lines(&self) -> Vec<String> {
        self.ingredients
            .iter()
            .map(|i| i.line.clone().unwrap_or_else(|| i.name.clone()))
            .collect()
    }

    /// Combined free text of the recipe, used for language detection.
    pub fn combined_text(&self) -> String {
        let mut parts: Vec<String> = vec![self.title.clone()];
        if let Some(desc) = &self.description {
            parts.push(desc.clone());
        }
        parts.extend(self.ingredient_lines());
        parts.extend(self.steps.iter().map(|s| s.text.clone()));
        parts.join("\n")
    }
}

/// Amounts of "0" in any common spelling mean "no amount given".
pub fn normalize_amount(amount: Option<String>) -> Option<String> {
    let value = amount.map(|a| clean_text(&a)).filter(|a| !a.is_empty())?;
    if matches!(value.as_str(), "0" | "0.0" | "0,0") {
        return None;
    }
    Some(value)
}

/// Build unparsed ingredients from raw text lines, dropping blanks.
pub fn ingredients_from_lines<I, S>(lines: I) -> Vec<ImportedIngredient>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let cleaned = clean_text(line.as_ref());
            if cleaned.is_empty() {
                return None;
            }
            Some(ImportedIngredient {
                name: cleaned.clone(),
                amount: None,
                line: Some(cleaned),
            })
        })
        .collect()
}

/// Build numbered steps from raw text lines, dropping blanks.
pub fn steps_from_lines<I, S>(lines: I) -> Vec<InstructionStep>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let cleaned = clean_text(line.as_ref());
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .enumerate()
        .map(|(i, text)| InstructionStep {
            step_number: (i + 1) as u32,
            text,
        })
        .collect()
}

/// A cached recipe row. Rows are insert-only: a better refetch inserts
/// a new row pointing at the one it supersedes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalRecipe {
    pub id: Uuid,
    /// Normalized source URL this row was imported from.
    pub source_url_normalized: String,
    pub source_domain: Option<String>,
    pub source_platform: Option<String>,
    pub language_code: String,
    pub payload: ImportedRecipe,
    pub quality_score: i32,
    pub is_complete: bool,
    pub missing_fields: Vec<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Hash over title, ingredients and steps; identical content across
    /// URL variants shares a canonical group.
    pub canonical_hash: String,
    /// Stable id shared by every version of the same underlying recipe.
    pub canonical_group_id: Uuid,
    /// Row this one replaced, if any. Null at the root of a chain.
    pub supersedes_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amounts_are_dropped() {
        assert_eq!(normalize_amount(Some("0".into())), None);
        assert_eq!(normalize_amount(Some("0.0".into())), None);
        assert_eq!(normalize_amount(Some("0,0".into())), None);
        assert_eq!(normalize_amount(Some(" 2 ".into())), Some("2".into()));
        assert_eq!(normalize_amount(Some("".into())), None);
        assert_eq!(normalize_amount(None), None);
    }

    #[test]
    fn lines_become_numbered_steps() {
        let steps = steps_from_lines(["Mix.", "", "  Bake. "]);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[1].step_number, 2);
        assert_eq!(steps[1].text, "Bake.");
    }

    #[test]
    fn ingredient_lines_prefer_raw_line() {
        let recipe = ImportedRecipe {
            ingredients: vec![
                ImportedIngredient {
                    name: "flour".into(),
                    line: Some("500 g flour".into()),
                    ..Default::default()
                },
                ImportedIngredient {
                    name: "salt".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(recipe.ingredient_lines(), vec!["500 g flour", "salt"]);
    }

    #[test]
    fn camel_case_payloads_deserialize() {
        let json = r#"{
            "title": "Pancakes",
            "sourceUrl": "https://example.com/p",
            "instructions": [{"stepNumber": 1, "text": "Mix"}],
            "prepTime": "10 min",
            "metadata": {"missingFields": ["servings"]}
        }"#;
        let recipe: ImportedRecipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.source_url.as_deref(), Some("https://example.com/p"));
        assert_eq!(recipe.steps.len(), 1);
        assert_eq!(recipe.prep_time.as_deref(), Some("10 min"));
        assert_eq!(recipe.metadata.missing_fields, vec!["servings"]);
    }
}
