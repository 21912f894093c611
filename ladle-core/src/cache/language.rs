//! Heuristic German/English language detection.
//!
//! Deliberately not model-based: the two supported interface languages
//! are told apart reliably by function words and kitchen vocabulary.

const GERMAN_TOKENS: &[&str] = &[
    " und ",
    " mit ",
    " zutaten",
    " ofen",
    " pfanne",
    " minuten",
    " gramm",
    " el ",
    " tl ",
    " die ",
    " der ",
    " das ",
    " zubereitung",
];

const ENGLISH_TOKENS: &[&str] = &[
    " and ",
    " with ",
    " ingredients",
    " oven",
    " pan",
    " minutes",
    " tbsp",
    " tsp",
    " cups",
    " preheat",
    " bake",
    " serve",
];

/// Detect "de" or "en" from free recipe text. Pure and
/// order-independent; empty or undecidable input defaults to "en".
pub fn detect_language(text: &str) -> &'static str {
    if text.trim().is_empty() {
        return "en";
    }

    // Padding lets edge tokens match at the start and end of the text.
    let lower = format!(" {} ", text.to_lowercase());

    // Each token counts at most once; repeating one common word must
    // not outweigh a broad vocabulary from the other language.
    let mut german: usize = GERMAN_TOKENS
        .iter()
        .filter(|t| lower.contains(*t))
        .count();
    let english: usize = ENGLISH_TOKENS
        .iter()
        .filter(|t| lower.contains(*t))
        .count();

    if lower.chars().any(|c| matches!(c, 'ä' | 'ö' | 'ü' | 'ß')) {
        german += 2;
    }

    if german > english {
        "de"
    } else {
        "en"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn german_recipe_text() {
        assert_eq!(detect_language("250 g Mehl und 2 Eier"), "de");
        assert_eq!(
            detect_language("Zutaten: 1 EL Butter, Zubereitung im Ofen"),
            "de"
        );
    }

    #[test]
    fn english_recipe_text() {
        assert_eq!(
            detect_language("preheat the oven and whisk the eggs"),
            "en"
        );
        assert_eq!(detect_language("2 cups flour with 1 tbsp sugar"), "en");
    }

    #[test]
    fn empty_and_ties_default_to_english() {
        assert_eq!(detect_language(""), "en");
        assert_eq!(detect_language("   "), "en");
        assert_eq!(detect_language("12345"), "en");
    }

    #[test]
    fn umlauts_tip_the_scale() {
        assert_eq!(detect_language("Rührei"), "de");
    }

    #[test]
    fn repeated_words_count_once() {
        // Seven distinct German markers against one English word used
        // eight times: vocabulary breadth wins, not repetition.
        let text = "Zutaten: Mehl und Zucker mit Butter, die Pfanne in den Ofen, \
                    20 Minuten Zubereitung. \
                    bake bake bake bake bake bake bake bake";
        assert_eq!(detect_language(text), "de");
    }

    #[test]
    fn order_independent() {
        let a = detect_language("Mehl und Zucker mit Butter");
        let b = detect_language("Butter mit Zucker und Mehl");
        assert_eq!(a, b);
    }
}
