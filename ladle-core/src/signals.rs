//! Signal bundles and extraction provenance.
//!
//! Platform fetchers gather raw fragments of evidence (captions,
//! transcripts, OCR text, page text) into a [`SignalBundle`] that the
//! structured extractor turns into a recipe. Which stages actually
//! contributed is tracked in a [`Provenance`], so the `extracted_via`
//! tag reflects the chain that ran rather than a hand-maintained string.

/// Raw, unstructured evidence about one recipe, as collected by a
/// platform fetcher. Closed shape: every fetcher fills the fields it
/// has and leaves the rest `None`.
#[derive(Debug, Clone, Default)]
pub struct SignalBundle {
    /// Source URL the signals were collected from.
    pub url: Option<String>,
    /// Title as reported by embed metadata or page markup.
    pub title_hint: Option<String>,
    /// Description or author-provided summary.
    pub description_hint: Option<String>,
    /// Uploader/author name.
    pub author_hint: Option<String>,
    /// Thumbnail or poster image URL.
    pub thumbnail_hint: Option<String>,
    /// Caption text recovered from a rendered page.
    pub caption_text: Option<String>,
    /// Speech-to-text transcript of the media's audio track.
    pub transcript: Option<String>,
    /// OCR text recovered from a screenshot or scanned photo.
    pub ocr_text: Option<String>,
    /// Visible text of the primary page.
    pub page_text: Option<String>,
    /// Visible text of a second candidate page (joint structuring).
    pub secondary_page_text: Option<String>,
    /// Steps recovered out-of-band (e.g. from subtitles), to be used
    /// verbatim instead of extracted ones.
    pub steps_override: Option<Vec<String>>,
    /// Media duration, when known.
    pub duration_secs: Option<u64>,
}

impl SignalBundle {
    pub fn for_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    /// True when no textual evidence was collected at all.
    pub fn is_empty(&self) -> bool {
        self.title_hint.is_none()
            && self.description_hint.is_none()
            && self.caption_text.is_none()
            && self.transcript.is_none()
            && self.ocr_text.is_none()
            && self.page_text.is_none()
            && self.secondary_page_text.is_none()
            && self.steps_override.is_none()
    }
}

/// Records which extraction stages contributed to a result.
///
/// Stages are recorded in the order they ran; the label joins them with
/// "+" ("yt-dlp+whisper+openai"). An empty provenance renders as a
/// caller-supplied fallback label.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    stages: Vec<&'static str>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage that produced usable output. Recording the same
    /// stage twice keeps the first position.
    pub fn record(&mut self, stage: &'static str) {
        if !self.stages.contains(&stage) {
            self.stages.push(stage);
        }
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| *s == stage)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The provenance tag, or `fallback` when no stage contributed.
    pub fn label_or(&self, fallback: &str) -> String {
        if self.stages.is_empty() {
            fallback.to_string()
        } else {
            self.stages.join("+")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_joins_stages_in_order() {
        let mut p = Provenance::new();
        p.record("yt-dlp");
        p.record("whisper");
        p.record("openai");
        assert_eq!(p.label_or("none"), "yt-dlp+whisper+openai");
    }

    #[test]
    fn duplicate_stages_keep_first_position() {
        let mut p = Provenance::new();
        p.record("oembed");
        p.record("whisper");
        p.record("oembed");
        assert_eq!(p.label_or("none"), "oembed+whisper");
    }

    #[test]
    fn empty_provenance_uses_fallback() {
        let p = Provenance::new();
        assert_eq!(p.label_or("openai_no_signals"), "openai_no_signals");
    }

    #[test]
    fn bundle_emptiness() {
        assert!(SignalBundle::for_url("https://x").is_empty());
        let bundle = SignalBundle {
            transcript: Some("mix the flour".into()),
            ..SignalBundle::default()
        };
        assert!(!bundle.is_empty());
    }
}
