//! Model-based structuring of signal bundles.

use serde::Deserialize;

use crate::error::ImportError;
use crate::llm::{LlmError, LlmProvider};
use crate::signals::SignalBundle;
use crate::text::clean_text;
use crate::types::{
    normalize_amount, steps_from_lines, ImportedIngredient, ImportedRecipe, InstructionStep,
    Nutrition, UsageEvent,
};

/// Fixed structuring instruction. The reply must be a single JSON
/// object; unknown fields are nulled and listed, never guessed.
const STRUCTURE_PROMPT: &str = "You are a recipe extraction engine. From the source material \
below, extract one recipe as a single JSON object with exactly these keys: title, description, \
mealType, difficulty, servings, prepTime, cookTime, totalTime, calories, protein, carbs, fat, \
chefNotes, tags (array of strings), ingredients (array of {name, amount}), instructions (array \
of step strings in order), missingFields (array naming every key you could not fill), \
confidence (0.0-1.0). Rules: respond with JSON only, no prose and no code fences. Use null for \
anything the material does not state; never invent values and never output 0 as a placeholder \
amount. Keep ingredient and step order exactly as given. Write the recipe in the language of \
the source material.";

/// Shape of the model's JSON reply. Lenient: steps may arrive as plain
/// strings or objects, and a few key spellings vary by model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmRecipe {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    meal_type: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    servings: Option<ServingsValue>,
    #[serde(default)]
    prep_time: Option<String>,
    #[serde(default)]
    cook_time: Option<String>,
    #[serde(default)]
    total_time: Option<String>,
    #[serde(default)]
    calories: Option<ServingsValue>,
    #[serde(default)]
    protein: Option<ServingsValue>,
    #[serde(default)]
    carbs: Option<ServingsValue>,
    #[serde(default)]
    fat: Option<ServingsValue>,
    #[serde(default)]
    chef_notes: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    ingredients: Vec<LlmIngredient>,
    #[serde(default, alias = "steps")]
    instructions: Vec<LlmStep>,
    #[serde(default)]
    missing_fields: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Models sometimes emit numbers where the schema says string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServingsValue {
    Text(String),
    Number(f64),
}

impl ServingsValue {
    fn into_string(self) -> String {
        match self {
            ServingsValue::Text(s) => s,
            ServingsValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LlmIngredient {
    Structured {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        amount: Option<ServingsValue>,
    },
    Line(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LlmStep {
    Structured {
        text: String,
    },
    Line(String),
}

/// Strip markdown code fences that models wrap JSON in despite
/// instructions.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

fn parse_reply(reply: &str) -> Result<LlmRecipe, LlmError> {
    serde_json::from_str(strip_fences(reply)).map_err(|e| LlmError::ParseError(e.to_string()))
}

fn opt_text(value: Option<String>) -> Option<String> {
    value.map(|s| clean_text(&s)).filter(|s| !s.is_empty())
}

fn convert(parsed: LlmRecipe, bundle: &SignalBundle) -> ImportedRecipe {
    let ingredients: Vec<ImportedIngredient> = parsed
        .ingredients
        .into_iter()
        .filter_map(|i| match i {
            LlmIngredient::Structured { name, amount } => {
                let name = opt_text(name)?;
                let amount = normalize_amount(amount.map(ServingsValue::into_string));
                let line = match &amount {
                    Some(a) => format!("{} {}", a, name),
                    None => name.clone(),
                };
                Some(ImportedIngredient {
                    name,
                    amount,
                    line: Some(line),
                })
            }
            LlmIngredient::Line(line) => {
                let line = clean_text(&line);
                if line.is_empty() {
                    return None;
                }
                Some(ImportedIngredient {
                    name: line.clone(),
                    amount: None,
                    line: Some(line),
                })
            }
        })
        .collect();

    // Steps recovered out-of-band (e.g. subtitles) replace the model's.
    let steps: Vec<InstructionStep> = match &bundle.steps_override {
        Some(lines) if !lines.is_empty() => steps_from_lines(lines.iter().map(String::as_str)),
        _ => steps_from_lines(parsed.instructions.into_iter().map(|s| match s {
            LlmStep::Structured { text } => text,
            LlmStep::Line(text) => text,
        })),
    };

    let mut recipe = ImportedRecipe {
        title: opt_text(parsed.title)
            .or_else(|| bundle.title_hint.clone())
            .unwrap_or_default(),
        description: opt_text(parsed.description),
        meal_type: opt_text(parsed.meal_type),
        difficulty: opt_text(parsed.difficulty),
        servings: opt_text(parsed.servings.map(ServingsValue::into_string)),
        prep_time: opt_text(parsed.prep_time),
        cook_time: opt_text(parsed.cook_time),
        total_time: opt_text(parsed.total_time),
        nutrition: Nutrition {
            calories: opt_text(parsed.calories.map(ServingsValue::into_string)),
            protein: opt_text(parsed.protein.map(ServingsValue::into_string)),
            carbs: opt_text(parsed.carbs.map(ServingsValue::into_string)),
            fat: opt_text(parsed.fat.map(ServingsValue::into_string)),
        },
        chef_notes: opt_text(parsed.chef_notes),
        tags: parsed
            .tags
            .into_iter()
            .map(|t| clean_text(&t))
            .filter(|t| !t.is_empty())
            .collect(),
        ingredients,
        steps,
        source_url: bundle.url.clone(),
        media_image_url: bundle.thumbnail_hint.clone(),
        ..Default::default()
    };
    recipe.metadata.missing_fields = parsed.missing_fields;
    recipe.metadata.confidence = parsed.confidence;
    recipe.source_domain = recipe
        .source_url
        .as_deref()
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string));
    recipe
}

/// Assemble the structuring prompt from whichever signals are present.
fn build_prompt(bundle: &SignalBundle) -> String {
    let mut prompt = String::from(STRUCTURE_PROMPT);
    prompt.push_str("\n\n");

    let mut section = |label: &str, value: &Option<String>| {
        if let Some(text) = value {
            if !text.trim().is_empty() {
                prompt.push_str(&format!("## {}\n{}\n\n", label, text.trim()));
            }
        }
    };

    section("Source URL", &bundle.url);
    section("Title hint", &bundle.title_hint);
    section("Author", &bundle.author_hint);
    section("Description", &bundle.description_hint);
    section("Caption", &bundle.caption_text);
    section("Audio transcript", &bundle.transcript);
    section("Text recognized in the image (OCR)", &bundle.ocr_text);
    section("Page text", &bundle.page_text);
    section("Second page text", &bundle.secondary_page_text);

    if let Some(duration) = bundle.duration_secs {
        prompt.push_str(&format!("## Video duration\n{} seconds\n\n", duration));
    }
    if bundle.steps_override.is_some() {
        prompt.push_str(
            "The preparation steps are already known and will be supplied separately; focus on \
             the remaining fields.\n",
        );
    }
    prompt
}

/// Run one structuring call over a signal bundle.
///
/// Returns the structured recipe plus the usage event for the call.
/// Emptiness is not checked here; callers that merge several candidate
/// extractions decide what counts as a failure.
pub async fn structure_signals(
    provider: &dyn LlmProvider,
    stage: &str,
    bundle: &SignalBundle,
) -> Result<(ImportedRecipe, UsageEvent), ImportError> {
    let prompt = build_prompt(bundle);
    tracing::debug!(stage, prompt_chars = prompt.len(), "structuring signals");
    let reply = provider.complete(&prompt).await?;
    let parsed = parse_reply(&reply).map_err(ImportError::Llm)?;
    let recipe = convert(parsed, bundle);
    let usage = UsageEvent::model_call(stage, provider.provider_name(), provider.model_name());
    Ok((recipe, usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeProvider;

    const REPLY: &str = r#"```json
    {
        "title": "Shakshuka",
        "description": "Eggs in tomato sauce",
        "servings": 2,
        "prepTime": "10 min",
        "calories": 420,
        "tags": ["breakfast"],
        "ingredients": [
            {"name": "eggs", "amount": "4"},
            {"name": "olive oil", "amount": "0"},
            "1 can tomatoes"
        ],
        "instructions": ["Simmer the sauce.", {"text": "Crack in the eggs."}],
        "missingFields": ["cookTime"],
        "confidence": 0.9
    }
    ```"#;

    #[tokio::test]
    async fn reply_is_parsed_with_zero_amount_guard() {
        let provider = FakeProvider::with_response("recipe extraction engine", REPLY);
        let bundle = SignalBundle {
            url: Some("https://ex.com/shakshuka".into()),
            transcript: Some("today we make shakshuka".into()),
            ..Default::default()
        };
        let (recipe, usage) = structure_signals(&provider, "test", &bundle).await.unwrap();

        assert_eq!(recipe.title, "Shakshuka");
        assert_eq!(recipe.servings.as_deref(), Some("2"));
        assert_eq!(recipe.nutrition.calories.as_deref(), Some("420"));
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.ingredients[0].amount.as_deref(), Some("4"));
        // "0" means unknown, never a real quantity.
        assert_eq!(recipe.ingredients[1].amount, None);
        assert_eq!(recipe.ingredients[2].name, "1 can tomatoes");
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.steps[1].text, "Crack in the eggs.");
        assert_eq!(recipe.metadata.missing_fields, vec!["cookTime"]);
        assert_eq!(recipe.metadata.confidence, Some(0.9));
        assert_eq!(recipe.source_domain.as_deref(), Some("ex.com"));
        assert_eq!(usage.provider, "fake");
    }

    #[tokio::test]
    async fn steps_override_replaces_model_steps() {
        let provider = FakeProvider::with_response("recipe extraction engine", REPLY);
        let bundle = SignalBundle {
            url: Some("https://ex.com/shakshuka".into()),
            steps_override: Some(vec!["Heat the pan.".into(), "Add everything.".into()]),
            ..Default::default()
        };
        let (recipe, _) = structure_signals(&provider, "test", &bundle).await.unwrap();
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.steps[0].text, "Heat the pan.");
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_parse_error() {
        let provider = FakeProvider::new().with_default_response("not json at all");
        let bundle = SignalBundle::for_url("https://ex.com/r");
        let result = structure_signals(&provider, "test", &bundle).await;
        assert!(matches!(
            result,
            Err(ImportError::Llm(LlmError::ParseError(_)))
        ));
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn prompt_contains_present_signals_only() {
        let bundle = SignalBundle {
            url: Some("https://ex.com/r".into()),
            transcript: Some("mix it".into()),
            ..Default::default()
        };
        let prompt = build_prompt(&bundle);
        assert!(prompt.contains("Audio transcript"));
        assert!(!prompt.contains("OCR"));
    }
}
