//! Visible page text and meta tags, the raw material for model-based
//! structuring when no schema.org markup exists.

use scraper::{Html, Selector};

use crate::text::{clean_text, truncate_chars};

/// Hard cap on visible page text handed to a model call.
pub const MAX_PAGE_TEXT_CHARS: usize = 120_000;

/// og:/meta tags a rendered page exposes about its content.
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Extract the page's visible text, with script/style/nav noise removed
/// and whitespace collapsed, capped at [`MAX_PAGE_TEXT_CHARS`].
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let skip = ["script", "style", "noscript", "nav", "footer", "iframe", "svg"];

    let mut out = String::new();
    let root = document.root_element();
    collect_text(&root, &skip, &mut out);

    let cleaned = clean_text(&out);
    truncate_chars(&cleaned, MAX_PAGE_TEXT_CHARS).to_string()
}

fn collect_text(element: &scraper::ElementRef, skip: &[&str], out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(el) = scraper::ElementRef::wrap(child) {
            if !skip.contains(&el.value().name()) {
                collect_text(&el, skip, out);
            }
        }
    }
}

/// Read og: meta tags (falling back to <title> and name="description").
pub fn page_meta(html: &str) -> PageMeta {
    let document = Html::parse_document(html);

    let mut meta = PageMeta {
        title: meta_content(&document, r#"meta[property="og:title"]"#),
        description: meta_content(&document, r#"meta[property="og:description"]"#)
            .or_else(|| meta_content(&document, r#"meta[name="description"]"#)),
        image: meta_content(&document, r#"meta[property="og:image"]"#),
    };

    if meta.title.is_none() {
        if let Ok(selector) = Selector::parse("title") {
            meta.title = document
                .select(&selector)
                .next()
                .map(|el| clean_text(&el.text().collect::<String>()))
                .filter(|t| !t.is_empty());
        }
    }

    meta
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("content")
        .map(clean_text)
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_styles_are_dropped() {
        let html = r#"
            <html><head><style>body { color: red; }</style></head>
            <body>
                <script>var x = 1;</script>
                <h1>Lasagne</h1>
                <p>Layer   the
                noodles.</p>
                <footer>© 2024</footer>
            </body></html>
        "#;
        let text = visible_text(html);
        assert_eq!(text, "Lasagne Layer the noodles.");
    }

    #[test]
    fn meta_tags_are_read_with_fallbacks() {
        let html = r#"
            <html><head>
                <title>Fallback Title</title>
                <meta name="description" content="Plain description">
                <meta property="og:image" content="https://ex.com/i.jpg">
            </head><body></body></html>
        "#;
        let meta = page_meta(html);
        assert_eq!(meta.title.as_deref(), Some("Fallback Title"));
        assert_eq!(meta.description.as_deref(), Some("Plain description"));
        assert_eq!(meta.image.as_deref(), Some("https://ex.com/i.jpg"));
    }

    #[test]
    fn og_tags_win_over_fallbacks() {
        let html = r#"
            <html><head>
                <title>Fallback</title>
                <meta property="og:title" content="OG Title">
                <meta property="og:description" content="OG desc">
                <meta name="description" content="Plain">
            </head><body></body></html>
        "#;
        let meta = page_meta(html);
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
        assert_eq!(meta.description.as_deref(), Some("OG desc"));
    }
}
