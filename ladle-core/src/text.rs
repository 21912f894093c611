//! Small text utilities shared across extractors.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// ISO-8601 duration as produced by schema.org markup, e.g. "PT1H30M".
static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid regex")
});

/// Collapse runs of whitespace to a single space and trim.
pub fn clean_text(value: &str) -> String {
    WHITESPACE.replace_all(value, " ").trim().to_string()
}

/// Clean an optional string, mapping empty results back to `None`.
pub fn clean_opt(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|s| !s.is_empty())
}

/// Normalize an ISO-8601 duration into human-readable free text
/// ("PT1H30M" -> "1 h 30 min"). Non-ISO input passes through cleaned.
pub fn normalize_iso_duration(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let caps = match ISO_DURATION.captures(trimmed) {
        Some(c) => c,
        None => return Some(clean_text(trimmed)),
    };

    let mut parts: Vec<String> = Vec::new();
    for (group, label) in [(1, "d"), (2, "h"), (3, "min"), (4, "s")] {
        if let Some(m) = caps.get(group) {
            if let Ok(number) = m.as_str().parse::<u64>() {
                if number > 0 {
                    parts.push(format!("{} {}", number, label));
                }
            }
        }
    }

    if parts.is_empty() {
        return Some("0 min".to_string());
    }
    Some(parts.join(" "))
}

/// Normalize a servings value: prefer the leading number ("4 Portionen"
/// -> "4"), otherwise fall back to the cleaned text.
pub fn normalize_servings(value: &str) -> Option<String> {
    let cleaned = clean_text(value);
    if cleaned.is_empty() {
        return None;
    }
    let digits: String = cleaned.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        Some(cleaned)
    } else {
        Some(digits)
    }
}

/// Truncate to at most `max_chars` characters on a char boundary.
/// Hard caps on text sent to model calls are enforced with this.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
