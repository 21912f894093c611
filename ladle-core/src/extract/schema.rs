//! Deterministic schema.org Recipe extraction from page markup.
//!
//! JSON-LD is found with a regex fast path to avoid DOM parsing on the
//! happy path. All candidate Recipe nodes are collected and the node
//! missing the fewest core fields wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::text::{clean_opt, clean_text, normalize_iso_duration, normalize_servings};
use crate::types::{
    ingredients_from_lines, steps_from_lines, ImportedRecipe, Nutrition,
};

/// JSON-LD script tags (case-insensitive type attribute).
static JSONLD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

static OG_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property\s*=\s*["']og:image["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

static OG_IMAGE_REGEX_ALT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content\s*=\s*["']([^"']+)["'][^>]*property\s*=\s*["']og:image["']"#)
        .expect("valid regex")
});

/// Extract a recipe from embedded schema.org markup, if any.
///
/// Returns `None` when no Recipe node with at least a title and either
/// ingredients or steps exists; callers then fall back to a model call.
pub fn extract_schema_recipe(html: &str, source_url: &str) -> Option<ImportedRecipe> {
    let mut candidates: Vec<ImportedRecipe> = Vec::new();

    for cap in JSONLD_REGEX.captures_iter(html) {
        let json_text = match cap.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };
        let json: Value = match serde_json::from_str(&sanitize_json(json_text)) {
            Ok(v) => v,
            Err(_) => continue,
        };
        collect_recipe_nodes(&json, &mut |node| {
            if let Some(recipe) = recipe_from_node(node, source_url) {
                candidates.push(recipe);
            }
        });
    }

    let mut best = candidates
        .into_iter()
        .min_by_key(|r| missing_core_fields(r))?;

    if best.title.is_empty() || best.is_empty() {
        return None;
    }

    if best.media_image_url.is_none() {
        best.media_image_url = extract_og_image(html);
    }
    Some(best)
}

/// Pull the og:image URL out of page markup.
pub fn extract_og_image(html: &str) -> Option<String> {
    OG_IMAGE_REGEX
        .captures(html)
        .or_else(|| OG_IMAGE_REGEX_ALT.captures(html))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Some sites put literal newlines/tabs inside JSON strings.
fn sanitize_json(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    // Toggles per backslash: a quote after "\\" is a real delimiter.
    let mut escaped = false;

    for c in json.chars() {
        if in_string && escaped {
            escaped = false;
            result.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = !in_string;
                result.push(c);
            }
            '\\' if in_string => {
                escaped = true;
                result.push(c);
            }
            '\n' if in_string => result.push_str("\\n"),
            '\r' if in_string => result.push_str("\\r"),
            '\t' if in_string => result.push_str("\\t"),
            c if in_string && c.is_control() => {}
            _ => result.push(c),
        }
    }

    result
}

/// Recursively visit every Recipe node, including @graph members and
/// nodes with array-valued @type.
fn collect_recipe_nodes<'a>(json: &'a Value, visit: &mut dyn FnMut(&'a Value)) {
    match json {
        Value::Object(obj) => {
            if let Some(type_val) = obj.get("@type") {
                let is_recipe = match type_val {
                    Value::String(s) => s == "Recipe",
                    Value::Array(arr) => arr.iter().any(|v| v == "Recipe"),
                    _ => false,
                };
                if is_recipe {
                    visit(json);
                }
            }
            for (_, value) in obj {
                collect_recipe_nodes(value, visit);
            }
        }
        Value::Array(arr) => {
            for item in arr {
                collect_recipe_nodes(item, visit);
            }
        }
        _ => {}
    }
}

/// Count how many core fields a candidate lacks; the best node lacks
/// the fewest.
fn missing_core_fields(recipe: &ImportedRecipe) -> usize {
    let mut missing = 0;
    if recipe.title.is_empty() {
        missing += 1;
    }
    if recipe.description.is_none() {
        missing += 1;
    }
    if recipe.ingredients.is_empty() {
        missing += 1;
    }
    if recipe.steps.is_empty() {
        missing += 1;
    }
    missing
}

fn recipe_from_node(node: &Value, source_url: &str) -> Option<ImportedRecipe> {
    let title = node
        .get("name")
        .and_then(Value::as_str)
        .map(clean_text)
        .unwrap_or_default();

    let ingredients = node
        .get("recipeIngredient")
        .and_then(Value::as_array)
        .map(|arr| {
            ingredients_from_lines(arr.iter().filter_map(Value::as_str))
        })
        .unwrap_or_default();

    let steps = node
        .get("recipeInstructions")
        .map(|v| steps_from_lines(instruction_lines(v)))
        .unwrap_or_default();

    let servings = node
        .get("recipeYield")
        .and_then(string_or_first)
        .and_then(|s| normalize_servings(&s));

    let nutrition = node
        .get("nutrition")
        .map(|n| Nutrition {
            calories: n.get("calories").and_then(Value::as_str).map(clean_text),
            protein: n
                .get("proteinContent")
                .and_then(Value::as_str)
                .map(clean_text),
            carbs: n
                .get("carbohydrateContent")
                .and_then(Value::as_str)
                .map(clean_text),
            fat: n.get("fatContent").and_then(Value::as_str).map(clean_text),
        })
        .unwrap_or_default();

    let domain = url::Url::parse(source_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()));

    Some(ImportedRecipe {
        title,
        description: node
            .get("description")
            .and_then(Value::as_str)
            .and_then(|s| clean_opt(Some(s))),
        servings,
        prep_time: duration_field(node, "prepTime"),
        cook_time: duration_field(node, "cookTime"),
        total_time: duration_field(node, "totalTime"),
        nutrition,
        tags: keyword_tags(node),
        ingredients,
        steps,
        source_url: Some(source_url.to_string()),
        source_domain: domain,
        media_image_url: image_url(node),
        media_video_url: video_url(node),
        extracted_via: Some("schema_org".to_string()),
        ..Default::default()
    })
}

fn duration_field(node: &Value, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_str)
        .and_then(normalize_iso_duration)
}

fn string_or_first(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(arr) => arr.first().and_then(string_or_first),
        _ => None,
    }
}

/// Instruction lines out of recipeInstructions: plain string, list of
/// strings, HowToStep objects, or HowToSection with itemListElement.
fn instruction_lines(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split('\n')
            .map(str::to_string)
            .collect(),
        Value::Array(arr) => {
            let mut lines = Vec::new();
            for item in arr {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    lines.push(text.to_string());
                } else if let Some(s) = item.as_str() {
                    lines.push(s.to_string());
                } else if let Some(items) =
                    item.get("itemListElement").and_then(Value::as_array)
                {
                    for step in items {
                        if let Some(text) = step.get("text").and_then(Value::as_str) {
                            lines.push(text.to_string());
                        }
                    }
                }
            }
            lines
        }
        _ => Vec::new(),
    }
}

/// Image in schema.org markup: a string, an object with url, or a list
/// of either.
fn image_url(node: &Value) -> Option<String> {
    let image = node.get("image")?;
    match image {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
        Value::Array(arr) => arr.iter().find_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => {
                obj.get("url").and_then(Value::as_str).map(str::to_string)
            }
            _ => None,
        }),
        _ => None,
    }
}

fn video_url(node: &Value) -> Option<String> {
    let video = node.get("video")?;
    let video = match video {
        Value::Array(arr) => arr.first()?,
        other => other,
    };
    for key in ["contentUrl", "url", "embedUrl"] {
        if let Some(url) = video.get(key).and_then(Value::as_str) {
            return Some(url.to_string());
        }
    }
    None
}

fn keyword_tags(node: &Value) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    if let Some(keywords) = node.get("keywords") {
        match keywords {
            Value::String(s) => {
                tags.extend(s.split(',').map(clean_text).filter(|t| !t.is_empty()))
            }
            Value::Array(arr) => tags.extend(
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(clean_text)
                    .filter(|t| !t.is_empty()),
            ),
            _ => {}
        }
    }
    if let Some(category) = node.get("recipeCategory").and_then(string_or_first) {
        let category = clean_text(&category);
        if !category.is_empty() && !tags.contains(&category) {
            tags.push(category);
        }
    }
    tags
}
