//! Pinterest import: a pin is a pointer, not a page.
//!
//! The recipe almost never lives on the pin itself. The chain digs the
//! outbound destination URL out of the pin page (markup, embedded JSON
//! state, the private PinResource API), scrapes the destination and an
//! optional visit-through page, and keeps whichever candidate recipe
//! scores best.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::cache::FetchedImport;
use crate::error::ImportError;
use crate::extract::{extract_og_image, extract_schema_recipe, page_meta, structure_signals, visible_text};
use crate::http::HttpClient;
use crate::importer::ImportContext;
use crate::rehost::rehost_image;
use crate::signals::SignalBundle;
use crate::text::{clean_opt, clean_text, normalize_iso_duration, normalize_servings};
use crate::types::{ingredients_from_lines, steps_from_lines, ImportedRecipe};

/// Link texts that mark the pin's outbound link (German and English).
const VISIT_SITE_PATTERNS: &[&str] = &[
    "website besuchen",
    "webseite besuchen",
    "visit website",
    "visit site",
    "zur website",
    "zur webseite",
    "open website",
    "open site",
];

/// JSON keys that tend to hold the pin's outbound URL.
const URL_KEYS: &[&str] = &[
    "tracked_link",
    "link",
    "url",
    "destination",
    "destination_url",
    "destinationurl",
    "canonical_url",
    "canonicalurl",
    "href",
    "redirect_url",
    "redirecturl",
];

/// Script blobs carrying Pinterest's serialized page state.
const STATE_MARKERS: &[&str] = &["__PWS_DATA__", "__PWS_INITIAL_PROPS__", "__PWS_INITIAL_STATE__"];

static PIN_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/pin/(\d+)").expect("valid regex"));

static JSON_URL_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:tracked_link|link|url)"\s*:\s*"([^"]+)""#).expect("valid regex")
});

static RAW_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s'"\\]+"#).expect("valid regex"));

/// Window scanned around the pin id when the structured lookups fail.
const PIN_WINDOW_CHARS: usize = 20_000;

pub async fn import_pinterest(
    ctx: &ImportContext,
    url: &str,
) -> Result<FetchedImport, ImportError> {
    // Pinterest renders its pin data client side; prefer a real
    // browser, fall back to the raw page.
    let pin_html = match ctx.render_html(url).await {
        Ok(html) => html,
        Err(err) => {
            tracing::debug!(url, error = %err, "render failed, fetching pin page directly");
            ctx.http.fetch_html(url).await?
        }
    };

    let pin_image = extract_og_image(&pin_html);
    let pin_id = PIN_ID_REGEX
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let mut destination = find_destination_url(&pin_html, pin_id.as_deref());
    if destination.is_none() {
        if let Some(id) = &pin_id {
            destination = pin_resource_url(ctx.http.as_ref(), id).await;
            if destination.is_some() {
                tracing::debug!(pin_id = %id, "destination resolved via PinResource API");
            }
        }
    }
    match &destination {
        Some(dest) => tracing::info!(url, destination = %dest, "pin destination resolved"),
        None => tracing::info!(url, "pin destination not found"),
    }

    // Candidate 1: the pin page itself.
    let mut pin_recipe = pin_recipe_from_state(&pin_html, url, pin_image.clone());
    if pin_recipe.steps.is_empty() && pin_recipe.ingredients.len() < 5 {
        pin_recipe = enrich_from_pin_page(ctx, url, &pin_html, pin_recipe).await;
    }

    let mut candidates: Vec<Candidate> = Vec::new();

    let mut website_url = None;
    if let Some(dest_url) = destination.clone() {
        match ctx.http.fetch_html(&dest_url).await {
            Ok(dest_html) => {
                let dest_image = extract_og_image(&dest_html).or_else(|| pin_image.clone());
                let visit = find_visit_website_url(&dest_html, &dest_url);

                let recipe = scrape_recipe_page(
                    ctx,
                    &dest_url,
                    &dest_html,
                    dest_image.clone(),
                    "pinterest_destination_schema",
                    "pinterest_destination_openai",
                )
                .await?;
                candidates.push(Candidate {
                    url: dest_url.clone(),
                    page_text: visible_text(&dest_html),
                    image: dest_image.clone(),
                    recipe,
                });

                if let Some(visit_url) = visit.filter(|v| v != &dest_url) {
                    match ctx.http.fetch_html(&visit_url).await {
                        Ok(visit_html) => {
                            let visit_image =
                                extract_og_image(&visit_html).or_else(|| dest_image.clone());
                            let recipe = scrape_recipe_page(
                                ctx,
                                &visit_url,
                                &visit_html,
                                visit_image.clone(),
                                "pinterest_website_schema",
                                "pinterest_website_openai",
                            )
                            .await?;
                            candidates.push(Candidate {
                                url: visit_url.clone(),
                                page_text: visible_text(&visit_html),
                                image: visit_image,
                                recipe,
                            });
                            website_url = Some(visit_url);
                        }
                        Err(err) => {
                            tracing::debug!(url = %visit_url, error = %err, "visit-through fetch failed")
                        }
                    }
                }
            }
            Err(err) => {
                tracing::debug!(url = %dest_url, error = %err, "destination fetch failed");
                destination = None;
            }
        }
    }

    candidates.push(Candidate {
        url: url.to_string(),
        page_text: visible_text(&pin_html),
        image: pin_image.clone(),
        recipe: pin_recipe,
    });

    candidates.sort_by_key(|c| std::cmp::Reverse(candidate_score(&c.recipe)));
    let mut best = candidates.remove(0);

    // An LLM-derived winner with a second page on hand gets one joint
    // structuring attempt over both pages.
    let llm_derived = best
        .recipe
        .extracted_via
        .as_deref()
        .is_some_and(|v| v.contains("openai"));
    if llm_derived && !candidates.is_empty() {
        let secondary = &candidates[0];
        let bundle = SignalBundle {
            url: Some(best.url.clone()),
            thumbnail_hint: best.image.clone().or_else(|| secondary.image.clone()),
            page_text: Some(best.page_text.clone()),
            secondary_page_text: Some(secondary.page_text.clone()),
            ..SignalBundle::default()
        };
        match structure_signals(ctx.llm.as_ref(), "pinterest_openai_joint", &bundle).await {
            Ok((mut joint, usage)) => {
                joint.metadata.usage.push(usage);
                joint.extracted_via = Some("pinterest_openai_with_secondary_context".to_string());
                if candidate_score(&joint) > candidate_score(&best.recipe) {
                    best.recipe = joint;
                }
            }
            Err(err) => tracing::debug!(error = %err, "joint structuring failed"),
        }
    }

    let mut recipe = best.recipe;
    if recipe.is_empty() {
        return Err(ImportError::EmptyExtraction);
    }

    recipe.source_platform = Some("pinterest".to_string());
    recipe.source_url = Some(best.url.clone());
    recipe.source_domain = domain_of(&best.url);
    if recipe.media_image_url.is_none() {
        recipe.media_image_url = best.image.or(pin_image);
    }
    recipe.metadata.destination_url = destination.clone();
    recipe.metadata.destination_domain = destination.as_deref().and_then(domain_of);
    recipe.metadata.website_url = website_url;

    let mut local_media = None;
    if let Some(image_url) = recipe.media_image_url.clone() {
        if image_url.starts_with("http") {
            match rehost_image(ctx.http.as_ref(), &image_url, &ctx.settings.media_dir).await {
                Ok(path) => {
                    recipe.media_local_path = Some(path.clone());
                    local_media = Some(path);
                }
                Err(err) => tracing::debug!(url = %image_url, error = %err, "image rehost failed"),
            }
        }
    }

    Ok(FetchedImport {
        recipe,
        local_media,
    })
}

struct Candidate {
    url: String,
    page_text: String,
    image: Option<String>,
    recipe: ImportedRecipe,
}

fn domain_of<S: AsRef<str>>(url: S) -> Option<String> {
    Url::parse(url.as_ref())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Rank candidate recipes: presence of the descriptive fields plus
/// capped ingredient and step counts, so a fuller extraction wins
/// without a listicle's 200 pseudo-steps dominating.
fn candidate_score(recipe: &ImportedRecipe) -> usize {
    let mut score = 0;
    if !recipe.title.is_empty() {
        score += 3;
    }
    if recipe.description.is_some() {
        score += 1;
    }
    if recipe.servings.is_some() {
        score += 1;
    }
    if recipe.prep_time.is_some() || recipe.cook_time.is_some() || recipe.total_time.is_some() {
        score += 1;
    }
    score += recipe.ingredients.len().min(50);
    score += recipe.steps.len().min(80);
    score
}

/// Schema.org first, model structuring second, exactly like the web
/// chain but with pinterest-specific provenance labels.
async fn scrape_recipe_page(
    ctx: &ImportContext,
    url: &str,
    html: &str,
    image: Option<String>,
    schema_label: &str,
    openai_label: &str,
) -> Result<ImportedRecipe, ImportError> {
    if let Some(mut recipe) = extract_schema_recipe(html, url) {
        recipe.extracted_via = Some(schema_label.to_string());
        if recipe.media_image_url.is_none() {
            recipe.media_image_url = image;
        }
        return Ok(recipe);
    }

    let meta = page_meta(html);
    let bundle = SignalBundle {
        url: Some(url.to_string()),
        title_hint: meta.title,
        description_hint: meta.description,
        thumbnail_hint: image,
        page_text: Some(visible_text(html)),
        ..SignalBundle::default()
    };
    let (mut recipe, usage) = structure_signals(ctx.llm.as_ref(), openai_label, &bundle).await?;
    recipe.extracted_via = Some(openai_label.to_string());
    recipe.metadata.usage.push(usage);
    Ok(recipe)
}

/// Merge a model extraction into a thin pin recipe, filling only what
/// is missing.
async fn enrich_from_pin_page(
    ctx: &ImportContext,
    url: &str,
    pin_html: &str,
    mut recipe: ImportedRecipe,
) -> ImportedRecipe {
    let bundle = SignalBundle {
        url: Some(url.to_string()),
        title_hint: Some(recipe.title.clone()).filter(|t| !t.is_empty()),
        description_hint: recipe.description.clone(),
        page_text: Some(visible_text(pin_html)),
        ..SignalBundle::default()
    };
    let (enriched, usage) =
        match structure_signals(ctx.llm.as_ref(), "pinterest_pin_openai", &bundle).await {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(url, error = %err, "pin enrichment failed");
                return recipe;
            }
        };

    if recipe.title.is_empty() && !enriched.title.is_empty() {
        recipe.title = enriched.title;
    }
    recipe.description = recipe.description.or(enriched.description);
    recipe.servings = recipe.servings.or(enriched.servings);
    recipe.prep_time = recipe.prep_time.or(enriched.prep_time);
    recipe.cook_time = recipe.cook_time.or(enriched.cook_time);
    recipe.total_time = recipe.total_time.or(enriched.total_time);
    if recipe.ingredients.is_empty() {
        recipe.ingredients = enriched.ingredients;
    }
    if recipe.steps.is_empty() {
        recipe.steps = enriched.steps;
    }
    recipe.media_image_url = recipe.media_image_url.or(enriched.media_image_url);
    recipe.extracted_via = Some(format!(
        "{}+openai_enrich",
        recipe.extracted_via.as_deref().unwrap_or("pinterest_pin")
    ));
    recipe.metadata.usage.push(usage);
    recipe
}

/// Build a recipe from the pin page alone: recipe-like nodes in the
/// serialized page state, else just the og: tags.
fn pin_recipe_from_state(pin_html: &str, url: &str, pin_image: Option<String>) -> ImportedRecipe {
    let meta = page_meta(pin_html);
    let mut recipe = ImportedRecipe {
        title: meta.title.unwrap_or_else(|| "Imported Recipe".to_string()),
        description: meta.description,
        source_platform: Some("pinterest".to_string()),
        source_url: Some(url.to_string()),
        source_domain: domain_of(url),
        extracted_via: Some("pinterest_dom_fallback".to_string()),
        media_image_url: pin_image,
        ..ImportedRecipe::default()
    };

    let best_node = STATE_MARKERS
        .iter()
        .filter_map(|marker| state_json(pin_html, marker))
        .find_map(|blob| {
            let mut nodes = Vec::new();
            collect_recipe_like_nodes(&blob, &mut nodes);
            nodes
                .into_iter()
                .max_by_key(|node| recipe_node_score(node))
        });

    let node = match best_node {
        Some(node) => node,
        None => return recipe,
    };

    if let Some(title) = string_field(&node, &["name", "title"]) {
        recipe.title = title;
    }
    if let Some(description) = string_field(&node, &["description"]) {
        recipe.description = Some(description);
    }
    recipe.prep_time = string_field(&node, &["prepTime"])
        .and_then(|t| normalize_iso_duration(&t))
        .or(recipe.prep_time);
    recipe.cook_time = string_field(&node, &["cookTime"])
        .and_then(|t| normalize_iso_duration(&t))
        .or(recipe.cook_time);
    recipe.total_time = string_field(&node, &["totalTime"])
        .and_then(|t| normalize_iso_duration(&t))
        .or(recipe.total_time);

    if let Some(servings) = node
        .get("recipeYield")
        .or_else(|| node.get("yield"))
        .and_then(first_string)
    {
        recipe.servings = normalize_servings(&servings);
    }

    if let Some(lines) = node
        .get("recipeIngredient")
        .or_else(|| node.get("ingredients"))
        .and_then(Value::as_array)
    {
        recipe.ingredients =
            ingredients_from_lines(lines.iter().filter_map(Value::as_str));
    }
    if let Some(instructions) = node
        .get("recipeInstructions")
        .or_else(|| node.get("instructions"))
    {
        recipe.steps = steps_from_lines(instruction_texts(instructions));
    }

    recipe.extracted_via = Some("pinterest_pin_json".to_string());
    recipe
}

fn string_field(node: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| node.get(*key))
        .and_then(Value::as_str)
        .and_then(|s| clean_opt(Some(s)))
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(first_string),
        _ => None,
    }
}

fn instruction_texts(value: &Value) -> Vec<String> {
    let entries = match value {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    };
    let mut texts = Vec::new();
    for entry in entries {
        match entry {
            Value::String(s) => texts.push(s.clone()),
            Value::Object(map) => {
                if let Some(text) = map.get("text").and_then(Value::as_str) {
                    texts.push(text.to_string());
                } else if let Some(items) = map.get("itemListElement").and_then(Value::as_array) {
                    for item in items {
                        match item {
                            Value::String(s) => texts.push(s.clone()),
                            Value::Object(inner) => {
                                if let Some(text) = inner.get("text").and_then(Value::as_str) {
                                    texts.push(text.to_string());
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }
    texts
}

/// Nodes that either declare @type Recipe or walk and quack like one.
fn collect_recipe_like_nodes(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            let declares_recipe = match map.get("@type") {
                Some(Value::String(t)) => t.eq_ignore_ascii_case("recipe"),
                Some(Value::Array(types)) => types
                    .iter()
                    .any(|t| t.as_str().is_some_and(|s| s.eq_ignore_ascii_case("recipe"))),
                _ => false,
            };
            let has_ingredients =
                map.contains_key("recipeIngredient") || map.contains_key("ingredients");
            let has_instructions =
                map.contains_key("recipeInstructions") || map.contains_key("instructions");
            let has_title = map.contains_key("name") || map.contains_key("title");

            if declares_recipe || ((has_ingredients || has_instructions) && has_title) {
                out.push(value.clone());
            }
            for child in map.values() {
                collect_recipe_like_nodes(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_recipe_like_nodes(item, out);
            }
        }
        _ => {}
    }
}

fn recipe_node_score(node: &Value) -> usize {
    let mut score = 0;
    if node.get("name").is_some() || node.get("title").is_some() {
        score += 3;
    }
    if node.get("description").is_some() {
        score += 1;
    }
    if node.get("recipeIngredient").is_some() || node.get("ingredients").is_some() {
        score += 4;
    }
    if node.get("recipeInstructions").is_some() || node.get("instructions").is_some() {
        score += 4;
    }
    if node.get("prepTime").is_some()
        || node.get("cookTime").is_some()
        || node.get("totalTime").is_some()
    {
        score += 1;
    }
    if node.get("recipeYield").is_some() || node.get("yield").is_some() {
        score += 1;
    }
    score
}

/// Parse a serialized-state script blob out of the page, by marker.
fn state_json(html: &str, marker: &str) -> Option<Value> {
    let marker_index = html.find(marker)?;
    let rest = &html[marker_index..];
    let brace = rest.find('{');
    let bracket = rest.find('[');
    let start = match (brace, bracket) {
        (Some(b), Some(k)) => b.min(k),
        (Some(b), None) => b,
        (None, Some(k)) => k,
        (None, None) => return None,
    };
    let blob = extract_json_blob(&rest[start..])?;
    serde_json::from_str(blob).ok()
}

/// Take the balanced JSON object/array at the start of `text`,
/// respecting strings and escapes.
fn extract_json_blob(text: &str) -> Option<&str> {
    let mut chars = text.char_indices();
    let (_, opener) = chars.next()?;
    let closer = match opener {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };

    let mut depth = 1;
    let mut in_string = false;
    let mut escape = false;
    for (idx, ch) in chars {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == opener => depth += 1,
            c if c == closer => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..idx + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn decode_escaped(url: &str) -> String {
    url.replace("\\/", "/")
}

fn normalize_candidate(url: &str) -> String {
    let url = decode_escaped(url.trim());
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        url
    }
}

/// A URL that leaves Pinterest entirely.
fn is_external(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host_str() {
        Some(host) => {
            let host = host.to_lowercase();
            !host.contains("pinterest.") && !host.contains("pinimg.") && host != "pin.it"
        }
        None => false,
    }
}

/// Pinterest's redirect links carry the real target in a `url` query
/// parameter.
fn outgoing_target(url: &str) -> Option<String> {
    if !url.contains("outgoing") || !url.contains("url=") {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// Resolve a raw candidate into an accepted external URL, following
/// outgoing redirects.
fn accept_candidate(raw: &str) -> Option<String> {
    let candidate = normalize_candidate(raw);
    let candidate = outgoing_target(&candidate).unwrap_or(candidate);
    if is_external(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Deep search of a JSON value for an external URL under a known key.
fn deep_find_external_url(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if URL_KEYS.contains(&key.to_lowercase().as_str()) {
                    if let Some(raw) = item.as_str() {
                        if let Some(found) = accept_candidate(raw) {
                            return Some(found);
                        }
                    }
                }
            }
            map.values().find_map(deep_find_external_url)
        }
        Value::Array(items) => items.iter().find_map(deep_find_external_url),
        _ => None,
    }
}

/// Layered destination search over the pin page, cheapest signal first.
fn find_destination_url(pin_html: &str, pin_id: Option<&str>) -> Option<String> {
    let document = Html::parse_document(pin_html);
    let anchors = Selector::parse("a[href]").ok()?;

    // Visit-site anchors by their link text.
    for anchor in document.select(&anchors) {
        let text = clean_text(&anchor.text().collect::<Vec<_>>().join(" ")).to_lowercase();
        if VISIT_SITE_PATTERNS.iter().any(|p| text.contains(p)) {
            if let Some(found) = anchor.value().attr("href").and_then(accept_candidate) {
                return Some(found);
            }
        }
    }
    // Outgoing redirect anchors.
    for anchor in document.select(&anchors) {
        if let Some(found) = anchor
            .value()
            .attr("href")
            .and_then(|href| outgoing_target(&normalize_candidate(href)))
            .filter(|u| is_external(u))
        {
            return Some(found);
        }
    }

    // Serialized page state.
    for marker in STATE_MARKERS {
        if let Some(blob) = state_json(pin_html, marker) {
            if let Some(found) = deep_find_external_url(&blob) {
                return Some(found);
            }
        }
    }

    // Raw scan in a window around the pin id.
    if let Some(id) = pin_id {
        if let Some(index) = pin_html.find(id) {
            let start = index.saturating_sub(PIN_WINDOW_CHARS);
            let end = (index + PIN_WINDOW_CHARS).min(pin_html.len());
            if let Some(window) = pin_html.get(start..end) {
                for cap in JSON_URL_KEY_REGEX.captures_iter(window) {
                    if let Some(found) = cap.get(1).and_then(|m| accept_candidate(m.as_str())) {
                        return Some(found);
                    }
                }
            }
        }
    }

    // Last resorts: outgoing URLs anywhere, then any external anchor.
    for m in RAW_URL_REGEX.find_iter(pin_html) {
        if let Some(found) = outgoing_target(m.as_str()).filter(|u| is_external(u)) {
            return Some(found);
        }
    }
    for anchor in document.select(&anchors) {
        if let Some(found) = anchor.value().attr("href").and_then(accept_candidate) {
            return Some(found);
        }
    }
    None
}

/// Ask the unauthenticated PinResource endpoint for the pin payload.
async fn pin_resource_url(http: &dyn HttpClient, pin_id: &str) -> Option<String> {
    let data = serde_json::json!({
        "options": {"id": pin_id, "field_set_key": "unauth_web_main_pin"},
        "context": {},
    });
    let mut endpoint = Url::parse("https://www.pinterest.com/resource/PinResource/get/").ok()?;
    endpoint
        .query_pairs_mut()
        .append_pair("source_url", &format!("/pin/{}/", pin_id))
        .append_pair("data", &data.to_string());

    let payload = match http.fetch_json(endpoint.as_str()).await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(pin_id, error = %err, "PinResource lookup failed");
            return None;
        }
    };

    let data = payload
        .get("resource_response")
        .and_then(|r| r.get("data"))
        .or_else(|| payload.get("data"))?;

    for key in ["tracked_link", "link"] {
        if let Some(found) = data.get(key).and_then(Value::as_str).and_then(accept_candidate) {
            return Some(found);
        }
    }
    for container in ["rich_metadata", "rich_summary"] {
        if let Some(found) = data
            .get(container)
            .and_then(|c| c.get("url"))
            .and_then(Value::as_str)
            .and_then(accept_candidate)
        {
            return Some(found);
        }
    }
    None
}

/// On the destination page, look for a further "visit website" link:
/// an explicit button, the canonical link, og:url, or any anchor that
/// leaves the destination host.
fn find_visit_website_url(dest_html: &str, dest_url: &str) -> Option<String> {
    let document = Html::parse_document(dest_html);
    let base = Url::parse(dest_url).ok()?;

    if let Ok(selector) = Selector::parse(r#"[data-test-id="visit-site-button"] a[href]"#) {
        for anchor in document.select(&selector) {
            if let Some(found) = resolve_external(&base, anchor.value().attr("href")?) {
                return Some(found);
            }
        }
    }

    if let Ok(anchors) = Selector::parse("a[href]") {
        for anchor in document.select(&anchors) {
            let text = clean_text(&anchor.text().collect::<Vec<_>>().join(" ")).to_lowercase();
            if VISIT_SITE_PATTERNS.iter().any(|p| text.contains(p)) {
                if let Some(found) = resolve_external(&base, anchor.value().attr("href")?) {
                    return Some(found);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse(r#"link[rel="canonical"]"#) {
        if let Some(found) = document
            .select(&selector)
            .next()
            .and_then(|l| l.value().attr("href"))
            .and_then(|href| resolve_external(&base, href))
        {
            return Some(found);
        }
    }
    if let Ok(selector) = Selector::parse(r#"meta[property="og:url"]"#) {
        if let Some(found) = document
            .select(&selector)
            .next()
            .and_then(|m| m.value().attr("content"))
            .and_then(|href| resolve_external(&base, href))
        {
            return Some(found);
        }
    }

    let dest_host = base.host_str().map(str::to_lowercase);
    if let Ok(anchors) = Selector::parse("a[href]") {
        for anchor in document.select(&anchors) {
            if let Some(found) = resolve_external(&base, anchor.value().attr("href")?) {
                let host = domain_of(&found).map(|h| h.to_lowercase());
                if host.is_some() && host != dest_host {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn resolve_external(base: &Url, href: &str) -> Option<String> {
    let joined = base.join(&normalize_candidate(href)).ok()?;
    let url = joined.to_string();
    if is_external(&url) {
        Some(url)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testutil::test_context;
    use crate::http::MockClient;
    use crate::llm::FakeProvider;
    use crate::render::FakeRenderer;
    use std::sync::Arc;

    const PIN_URL: &str = "https://www.pinterest.de/pin/1234567890/";

    #[test]
    fn external_url_filter_excludes_pinterest_hosts() {
        assert!(is_external("https://www.chefkoch.de/rezepte/1"));
        assert!(!is_external("https://www.pinterest.com/pin/1/"));
        assert!(!is_external("https://i.pinimg.com/x.jpg"));
        assert!(!is_external("https://pin.it/abc"));
        assert!(!is_external("mailto:x@y.de"));
    }

    #[test]
    fn outgoing_redirects_are_unwrapped() {
        let url = "https://www.pinterest.com/outgoing/?url=https%3A%2F%2Fblog.example%2Frezept";
        assert_eq!(
            outgoing_target(url).as_deref(),
            Some("https://blog.example/rezept")
        );
        assert_eq!(outgoing_target("https://blog.example/rezept"), None);
    }

    #[test]
    fn json_blob_scanner_respects_strings() {
        let text = r#"{"a": "quoted } brace", "b": {"c": 1}} trailing"#;
        assert_eq!(
            extract_json_blob(text),
            Some(r#"{"a": "quoted } brace", "b": {"c": 1}}"#)
        );
        assert_eq!(extract_json_blob("no json"), None);
    }

    #[test]
    fn destination_is_found_in_page_state() {
        let html = r#"<html><body>
            <script id="__PWS_DATA__" type="application/json">
            {"props": {"pins": {"1234567890": {"link": "https://blog.example/kuchen"}}}}
            </script></body></html>"#;
        assert_eq!(
            find_destination_url(html, Some("1234567890")).as_deref(),
            Some("https://blog.example/kuchen")
        );
    }

    #[test]
    fn visit_site_anchor_wins_over_state() {
        let html = r#"<html><body>
            <a href="https://blog.example/direkt">Website besuchen</a>
            <script id="__PWS_DATA__">{"link": "https://other.example/x"}</script>
            </body></html>"#;
        assert_eq!(
            find_destination_url(html, None).as_deref(),
            Some("https://blog.example/direkt")
        );
    }

    #[test]
    fn pin_state_recipe_nodes_are_scored() {
        let html = r#"<html><head>
            <meta property="og:title" content="Pinned cake">
            </head><body>
            <script id="__PWS_DATA__">{"resource": {
                "thin": {"title": "Just a title", "ingredients": ["1 egg"]},
                "full": {"name": "Marmorkuchen", "description": "Klassiker",
                         "recipeIngredient": ["4 Eier", "250 g Mehl"],
                         "recipeInstructions": ["Teig anrühren.", "Backen."],
                         "recipeYield": "12"}
            }}</script></body></html>"#;
        let recipe = pin_recipe_from_state(html, PIN_URL, None);
        assert_eq!(recipe.title, "Marmorkuchen");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.servings.as_deref(), Some("12"));
        assert_eq!(
            recipe.extracted_via.as_deref(),
            Some("pinterest_pin_json")
        );
    }

    const DEST_SCHEMA_PAGE: &str = r#"<html><head>
        <script type="application/ld+json">
        {"@type": "Recipe", "name": "Zimtschnecken",
         "recipeIngredient": ["500 g Mehl", "1 Würfel Hefe", "100 g Zucker"],
         "recipeInstructions": ["Teig gehen lassen.", "Rollen formen.", "Backen."]}
        </script></head><body></body></html>"#;

    #[tokio::test]
    async fn destination_schema_beats_the_pin() {
        let pin_page = r#"<html><head>
            <meta property="og:title" content="Zimtschnecken Idee">
            </head><body>
            <a href="https://blog.example/zimtschnecken">Visit website</a>
            </body></html>"#;
        let http = MockClient::new()
            .with_html("https://blog.example/zimtschnecken", DEST_SCHEMA_PAGE);
        let mut ctx = test_context(http, FakeProvider::new());
        ctx.renderer = Arc::new(FakeRenderer::new().with_page(PIN_URL, pin_page));

        let fetched = import_pinterest(&ctx, PIN_URL).await.unwrap();
        assert_eq!(fetched.recipe.title, "Zimtschnecken");
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("pinterest_destination_schema")
        );
        assert_eq!(
            fetched.recipe.source_url.as_deref(),
            Some("https://blog.example/zimtschnecken")
        );
        assert_eq!(
            fetched.recipe.metadata.destination_url.as_deref(),
            Some("https://blog.example/zimtschnecken")
        );
        assert_eq!(fetched.recipe.source_platform.as_deref(), Some("pinterest"));
    }

    #[tokio::test]
    async fn pin_without_destination_falls_back_to_pin_recipe() {
        let pin_page = r#"<html><head>
            <meta property="og:title" content="Kuchenidee">
            </head><body>
            <script id="__PWS_DATA__">{"resource": {"full": {
                "name": "Schneller Kuchen",
                "recipeIngredient": ["2 Eier", "100 g Mehl"],
                "recipeInstructions": ["Verrühren.", "Backen."]}}}</script>
            </body></html>"#;
        let mut ctx = test_context(MockClient::new(), FakeProvider::new());
        ctx.renderer = Arc::new(FakeRenderer::new().with_page(PIN_URL, pin_page));

        let fetched = import_pinterest(&ctx, PIN_URL).await.unwrap();
        assert_eq!(fetched.recipe.title, "Schneller Kuchen");
        assert!(fetched.recipe.metadata.destination_url.is_none());
    }
}
