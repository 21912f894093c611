//! YouTube import: cost-bounded, description first.
//!
//! Cooking videos on YouTube are long, and transcribing a full video is
//! the most expensive thing this pipeline can do. The chain reads the
//! description first, transcribes only when it has to, and then only in
//! fixed windows under a hard per-import budget.

use std::sync::LazyLock;

use regex::Regex;

use crate::cache::FetchedImport;
use crate::error::ImportError;
use crate::extract::structure_signals;
use crate::fetch::fetch_oembed;
use crate::importer::ImportContext;
use crate::llm::LlmProvider;
use crate::media::strip_vtt;
use crate::signals::SignalBundle;
use crate::text::{clean_text, truncate_chars};
use crate::types::UsageEvent;

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// Videos longer than this with no usable description are rejected.
const MAX_VIDEO_MINUTES_NO_DESC: u64 = 15;

/// Total character budget of the final structuring payload.
const MAX_TEXT_TO_LLM_CHARS: usize = 20_000;
const MAX_DESCRIPTION_CHARS: usize = 30_000;
const MAX_SUBTITLES_CHARS: usize = 14_000;
const MAX_TRANSCRIPT_CHARS: usize = 12_000;

/// Transcription windows as (start, duration) seconds: the opening of
/// the video plus probes further in, where steps usually live.
const WHISPER_CHUNKS: &[(u64, u64)] = &[(0, 90), (90, 90), (300, 90), (600, 90)];
const WHISPER_MAX_TOTAL_SECONDS: u64 = 240;

/// Steps-rescue stops early once this many steps are recovered.
const STEPS_RESCUE_TARGET: usize = 6;
/// Below this count the rescue is considered partial.
const STEPS_RESCUE_MINIMUM: usize = 4;
const MAX_RESCUED_STEPS: usize = 20;

const PARTIAL_STEPS_DISCLAIMER: &str = "Ingredients were found in the description, but steps \
could not be reliably extracted within the cost-safe transcription budget.";

/// Measurement words that mark a description line as an ingredient.
const UNIT_WORDS: &[&str] = &[
    "g", "kg", "ml", "l", "el", "tl", "tbsp", "tsp", "cup", "cups", "oz", "lb", "prise",
    "pinch", "stück", "stk", "scheiben", "cl", "dl",
];

/// Headings that introduce a step section (German and English).
const STEP_MARKERS: &[&str] = &[
    "step",
    "schritt",
    "zubereitung",
    "methode",
    "method",
    "instructions",
    "anleitung",
];

const COOKING_VERBS: &[&str] = &[
    "mix",
    "stir",
    "bake",
    "cook",
    "add",
    "preheat",
    "simmer",
    "whisk",
    "fold",
    "serve",
    "vermischen",
    "rühren",
    "backen",
    "kochen",
    "zugeben",
    "vorheizen",
    "köcheln",
    "servieren",
];

static STEP_HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*(step|schritt)\s*\d").expect("valid regex"));

static NUMBERED_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\s*[).:\-]\s+\S").expect("valid regex"));

static LEADING_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*[).:\-]\s*").expect("valid regex"));

/// True when at least two description lines look like measured
/// ingredients (a digit plus a unit word).
fn caption_has_ingredients(text: &str) -> bool {
    let mut hits = 0;
    for line in text.lines() {
        let lower = line.to_lowercase();
        if !lower.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let has_unit = lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| UNIT_WORDS.contains(&token));
        if has_unit {
            hits += 1;
            if hits >= 2 {
                return true;
            }
        }
    }
    false
}

/// True when the description plausibly carries preparation steps:
/// step headings, numbered lines, or enough cooking-verb density.
fn caption_has_steps(text: &str) -> bool {
    if STEP_HEADING_REGEX.is_match(text) || NUMBERED_LINE_REGEX.is_match(text) {
        return true;
    }
    let lower = text.to_lowercase();
    let has_marker = STEP_MARKERS.iter().any(|m| lower.contains(m));
    let verb_hits = COOKING_VERBS
        .iter()
        .filter(|verb| {
            lower
                .split(|c: char| !c.is_alphabetic())
                .any(|token| token == **verb)
        })
        .count();
    verb_hits >= if has_marker { 2 } else { 4 }
}

const STEPS_ONLY_PROMPT: &str = "From the video description and transcript below, extract ONLY \
the ordered preparation steps of the recipe. Respond with a JSON array of step strings, nothing \
else. Do not invent steps the material does not describe; return [] if there are none.";

/// One steps-only model call over the description plus whatever
/// transcript text has accumulated so far.
async fn extract_steps_only(
    llm: &dyn LlmProvider,
    description: &str,
    transcript: &str,
) -> Result<(Vec<String>, UsageEvent), ImportError> {
    let mut prompt = String::from(STEPS_ONLY_PROMPT);
    prompt.push_str("\n\n## Description\n");
    prompt.push_str(truncate_chars(description, 6_000));
    prompt.push_str("\n\n## Transcript\n");
    prompt.push_str(transcript);

    let reply = llm.complete(&prompt).await?;
    let usage = UsageEvent::model_call("youtube_steps_rescue", llm.provider_name(), llm.model_name());
    Ok((parse_steps_reply(&reply), usage))
}

/// Parse a steps-only reply: a JSON array when the model behaved,
/// otherwise its lines with leading numbering stripped.
fn parse_steps_reply(reply: &str) -> Vec<String> {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(steps) = serde_json::from_str::<Vec<String>>(trimmed) {
        return steps
            .into_iter()
            .map(|s| clean_text(&s))
            .filter(|s| !s.is_empty())
            .take(MAX_RESCUED_STEPS)
            .collect();
    }

    trimmed
        .lines()
        .map(|line| clean_text(LEADING_NUMBER_REGEX.replace(line.trim(), "").as_ref()))
        .filter(|line| line.chars().count() >= 3)
        .take(MAX_RESCUED_STEPS)
        .collect()
}

/// Fetch and clean the caption track, if the video has one.
async fn fetch_subtitles(ctx: &ImportContext, subtitle_url: &str) -> Option<String> {
    match ctx.http.fetch_html(subtitle_url).await {
        Ok(vtt) => {
            let text = strip_vtt(&vtt);
            if text.trim().is_empty() {
                None
            } else {
                Some(truncate_chars(&text, MAX_SUBTITLES_CHARS).to_string())
            }
        }
        Err(err) => {
            tracing::debug!(url = subtitle_url, error = %err, "subtitle fetch failed");
            None
        }
    }
}

/// Transcribe bounded windows of the audio track, re-running the
/// steps-only extraction after each chunk until enough steps exist.
/// `rescue_steps` is None when the caller only wants the transcript.
async fn whisper_chunks(
    ctx: &ImportContext,
    url: &str,
    description: &str,
    rescue_steps: Option<&mut Vec<String>>,
    usage_events: &mut Vec<UsageEvent>,
) -> Result<Vec<String>, ImportError> {
    let media_dir = ctx.settings.media_dir.join("youtube");
    let audio = ctx.downloader.download_audio(url, &media_dir).await?;

    let mut parts: Vec<String> = Vec::new();
    let mut total = 0u64;
    let mut steps = rescue_steps;

    for &(start, duration) in WHISPER_CHUNKS {
        if total + duration > WHISPER_MAX_TOTAL_SECONDS {
            break;
        }
        // One bad window must not sink the import; the remaining
        // chunks can still carry the recipe.
        let chunk = match ctx.downloader.cut_audio_chunk(&audio, start, duration).await {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::debug!(url, start, duration, error = %err, "audio chunk cut failed");
                continue;
            }
        };
        let text = match ctx.transcriber.transcribe(&chunk).await {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(url, start, duration, error = %err, "chunk transcription failed");
                continue;
            }
        };
        total += duration;
        usage_events.push(UsageEvent::transcription(
            "youtube_whisper_chunk",
            ctx.llm.provider_name(),
            &ctx.settings.whisper_model,
            duration,
        ));
        parts.push(format!("[{}-{} s] {}", start, start + duration, text.trim()));

        if let Some(steps) = steps.as_deref_mut() {
            let transcript = parts.join("\n");
            let (found, usage) =
                extract_steps_only(ctx.llm.as_ref(), description, &transcript).await?;
            usage_events.push(usage);
            if found.len() > steps.len() {
                *steps = found;
            }
            if steps.len() >= STEPS_RESCUE_TARGET {
                break;
            }
        }
    }

    Ok(parts)
}

pub async fn import_youtube(ctx: &ImportContext, url: &str) -> Result<FetchedImport, ImportError> {
    let oembed = fetch_oembed(ctx.http.as_ref(), OEMBED_ENDPOINT, url).await;
    let info = ctx.downloader.probe(url).await?;

    let description = info.description.clone().unwrap_or_default();
    let duration = info.duration_secs.unwrap_or(0);
    let has_ingredients = caption_has_ingredients(&description);
    let has_steps = has_ingredients && caption_has_steps(&description);

    // A long video with next to no description would force a very
    // expensive full transcription; refuse it outright.
    let cleaned_len = clean_text(&description).chars().count();
    if duration > MAX_VIDEO_MINUTES_NO_DESC * 60 && cleaned_len < 80 && !has_ingredients {
        return Err(ImportError::UnsupportedSource(
            "video is too long to transcribe and its description contains no recipe".to_string(),
        ));
    }

    let oembed = oembed.unwrap_or_default();
    let mut bundle = SignalBundle {
        url: Some(url.to_string()),
        title_hint: info.title.clone().or(oembed.title),
        author_hint: info.uploader.clone().or(oembed.author_name),
        thumbnail_hint: info.thumbnail_url.clone().or(oembed.thumbnail_url),
        description_hint: Some(truncate_chars(&description, MAX_DESCRIPTION_CHARS).to_string()),
        duration_secs: info.duration_secs,
        ..SignalBundle::default()
    };

    let mut usage_events: Vec<UsageEvent> = Vec::new();
    let mut disclaimer = None;
    let extracted_via: String;

    if has_ingredients && has_steps {
        // The description alone is a complete recipe; skip all media.
        extracted_via = "description_only+openai".to_string();
    } else if has_ingredients {
        // Ingredients are in the description but steps are not: rescue
        // the steps from subtitles, then from bounded transcription.
        let mut steps: Vec<String> = Vec::new();
        let mut subs_via = None;

        if let Some(subtitle_url) = &info.subtitle_url {
            if let Some(subs) = fetch_subtitles(ctx, subtitle_url).await {
                let (found, usage) =
                    extract_steps_only(ctx.llm.as_ref(), &description, &subs).await?;
                usage_events.push(usage);
                steps = found;
                subs_via = Some(if info.subtitle_auto {
                    "auto_subtitles"
                } else {
                    "subtitles"
                });
                bundle.transcript = Some(subs);
            }
        }

        let mut used_whisper = false;
        if steps.len() < STEPS_RESCUE_TARGET {
            let parts =
                whisper_chunks(ctx, url, &description, Some(&mut steps), &mut usage_events)
                    .await?;
            if !parts.is_empty() {
                used_whisper = true;
                let transcript = parts.join("\n");
                bundle.transcript =
                    Some(truncate_chars(&transcript, MAX_TRANSCRIPT_CHARS).to_string());
            }
        }

        extracted_via = if steps.len() < STEPS_RESCUE_MINIMUM {
            disclaimer = Some(PARTIAL_STEPS_DISCLAIMER.to_string());
            "steps_rescue_partial+openai".to_string()
        } else if used_whisper {
            "whisper_steps_rescue+openai".to_string()
        } else {
            format!("{}+steps_rescue+openai", subs_via.unwrap_or("subtitles"))
        };

        if !steps.is_empty() {
            bundle.steps_override = Some(steps);
        }
    } else {
        // Neither side is in the description: structure from the
        // caption track, or failing that from bounded transcription.
        let mut via = None;
        if let Some(subtitle_url) = &info.subtitle_url {
            if let Some(subs) = fetch_subtitles(ctx, subtitle_url).await {
                via = Some(if info.subtitle_auto {
                    "auto_subtitles+openai".to_string()
                } else {
                    "subtitles+openai".to_string()
                });
                bundle.transcript = Some(subs);
            }
        }
        if bundle.transcript.is_none() {
            let parts = whisper_chunks(ctx, url, &description, None, &mut usage_events).await?;
            let transcript = parts.join("\n");
            bundle.transcript =
                Some(truncate_chars(&transcript, MAX_TRANSCRIPT_CHARS).to_string());
        }
        extracted_via = via.unwrap_or_else(|| "subtitles_or_whisper_chunks+openai".to_string());
    }

    // Keep the final payload under the overall budget; the transcript
    // cap is firm, the description yields.
    if let (Some(desc), Some(transcript)) = (&bundle.description_hint, &bundle.transcript) {
        let budget = MAX_TEXT_TO_LLM_CHARS.saturating_sub(transcript.chars().count());
        if desc.chars().count() > budget {
            bundle.description_hint = Some(truncate_chars(desc, budget).to_string());
        }
    }

    let (mut recipe, usage) = structure_signals(ctx.llm.as_ref(), "youtube_openai", &bundle).await?;
    if recipe.is_empty() {
        return Err(ImportError::EmptyExtraction);
    }

    recipe.source_platform = Some("youtube".to_string());
    recipe.extracted_via = Some(extracted_via);
    recipe.metadata.disclaimer = disclaimer;
    recipe.metadata.usage.extend(usage_events);
    recipe.metadata.usage.push(usage);
    if recipe.media_image_url.is_none() {
        recipe.media_image_url = info.thumbnail_url;
    }

    Ok(FetchedImport {
        recipe,
        local_media: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testutil::test_context;
    use crate::http::MockClient;
    use crate::llm::FakeProvider;
    use crate::media::{FakeDownloader, VideoInfo};
    use crate::speech::FakeTranscriber;
    use std::path::PathBuf;
    use std::sync::Arc;

    const URL: &str = "https://www.youtube.com/watch?v=abc123";

    const FULL_DESCRIPTION: &str = "Best brownies ever!\n\
        Ingredients:\n200 g dark chocolate\n150 g butter\n3 eggs\n\
        Step 1: Melt chocolate and butter.\n\
        Step 2: Whisk in the eggs.\n\
        Step 3: Bake for 25 minutes.";

    const INGREDIENTS_ONLY_DESCRIPTION: &str = "My famous brownies.\n\
        200 g dark chocolate\n150 g butter\n3 eggs\n100 g flour";

    const RECIPE_REPLY: &str = r#"{"title": "Brownies",
        "ingredients": [{"name": "dark chocolate", "amount": "200 g"},
                        {"name": "butter", "amount": "150 g"}],
        "instructions": ["Melt chocolate and butter.", "Whisk in eggs.", "Bake."]}"#;

    #[test]
    fn ingredient_heuristic_needs_two_measured_lines() {
        assert!(caption_has_ingredients("200 g flour\n3 el sugar"));
        assert!(!caption_has_ingredients("200 g flour only"));
        assert!(!caption_has_ingredients("watch until the end! part 3"));
    }

    #[test]
    fn step_heuristic_accepts_headings_numbers_and_verbs() {
        assert!(caption_has_steps("Step 1: do the thing"));
        assert!(caption_has_steps("Schritt 2 alles mischen"));
        assert!(caption_has_steps("1. Mix the dough\n2. Bake it"));
        // Verb density with a marker present.
        assert!(caption_has_steps("Zubereitung: alles vermischen und backen"));
        // Not enough verbs without a marker.
        assert!(!caption_has_steps("I bake a lot of things on this channel"));
    }

    #[test]
    fn steps_reply_parses_json_and_falls_back_to_lines() {
        assert_eq!(
            parse_steps_reply(r#"["Melt.", "Whisk.", ""]"#),
            vec!["Melt.", "Whisk."]
        );
        assert_eq!(
            parse_steps_reply("1) Melt the butter\n2. Whisk eggs\nok"),
            vec!["Melt the butter", "Whisk eggs"]
        );
    }

    #[tokio::test]
    async fn complete_description_skips_all_media() {
        let llm = FakeProvider::with_response("Melt chocolate", RECIPE_REPLY);
        let mut ctx = test_context(MockClient::new(), llm);
        // No audio configured: any transcription attempt would fail.
        ctx.downloader = Arc::new(FakeDownloader::new().with_info(
            URL,
            VideoInfo {
                title: Some("Brownies".into()),
                description: Some(FULL_DESCRIPTION.into()),
                duration_secs: Some(300),
                ..VideoInfo::default()
            },
        ));

        let fetched = import_youtube(&ctx, URL).await.unwrap();
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("description_only+openai")
        );
        assert!(fetched.local_media.is_none());
    }

    #[tokio::test]
    async fn long_video_without_description_is_unsupported() {
        let ctx = {
            let mut ctx = test_context(MockClient::new(), FakeProvider::new());
            ctx.downloader = Arc::new(FakeDownloader::new().with_info(
                URL,
                VideoInfo {
                    description: Some("subscribe!".into()),
                    duration_secs: Some(40 * 60),
                    ..VideoInfo::default()
                },
            ));
            ctx
        };
        let result = import_youtube(&ctx, URL).await;
        assert!(matches!(result, Err(ImportError::UnsupportedSource(_))));
    }

    /// Fails on its first call, transcribes normally afterwards.
    #[derive(Debug, Default)]
    struct FlakyTranscriber {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl crate::speech::Transcriber for FlakyTranscriber {
        async fn transcribe(
            &self,
            _audio: &std::path::Path,
        ) -> Result<String, ImportError> {
            if self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                == 0
            {
                Err(ImportError::Tool {
                    tool: "whisper",
                    message: "garbled audio".to_string(),
                })
            } else {
                Ok("first we melt the chocolate, then whisk in the eggs".to_string())
            }
        }
    }

    #[tokio::test]
    async fn a_failed_chunk_does_not_sink_the_import() {
        let mut llm = FakeProvider::new();
        llm.add_response(
            "ordered preparation steps",
            r#"["Melt chocolate and butter.", "Whisk in the eggs.", "Fold in flour.",
                "Pour into the tin.", "Bake for 25 minutes.", "Let cool before cutting."]"#,
        );
        llm.add_response("recipe extraction engine", RECIPE_REPLY);

        let mut ctx = test_context(MockClient::new(), llm);
        ctx.transcriber = Arc::new(FlakyTranscriber::default());
        ctx.downloader = Arc::new(
            FakeDownloader::new()
                .with_info(
                    URL,
                    VideoInfo {
                        description: Some(INGREDIENTS_ONLY_DESCRIPTION.into()),
                        duration_secs: Some(300),
                        ..VideoInfo::default()
                    },
                )
                .with_audio(PathBuf::from("/tmp/fake-audio.mp3")),
        );

        let fetched = import_youtube(&ctx, URL).await.unwrap();
        // Chunk one never transcribed; chunk two still rescued the steps.
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("whisper_steps_rescue+openai")
        );
        assert_eq!(fetched.recipe.steps.len(), 6);
        assert!(fetched.recipe.metadata.disclaimer.is_none());
    }

    #[tokio::test]
    async fn subtitles_rescue_the_steps() {
        let mut llm = FakeProvider::new();
        llm.add_response(
            "ordered preparation steps",
            r#"["Melt chocolate and butter.", "Whisk in the eggs.", "Fold in flour.",
                "Pour into the tin.", "Bake for 25 minutes.", "Let cool before cutting."]"#,
        );
        llm.add_response("recipe extraction engine", RECIPE_REPLY);

        let http = MockClient::new().with_html(
            "https://cdn/subs.vtt",
            "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nfirst we melt the chocolate\n",
        );
        let mut ctx = test_context(http, llm);
        ctx.downloader = Arc::new(FakeDownloader::new().with_info(
            URL,
            VideoInfo {
                description: Some(INGREDIENTS_ONLY_DESCRIPTION.into()),
                duration_secs: Some(300),
                subtitle_url: Some("https://cdn/subs.vtt".into()),
                subtitle_auto: false,
                ..VideoInfo::default()
            },
        ));

        let fetched = import_youtube(&ctx, URL).await.unwrap();
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("subtitles+steps_rescue+openai")
        );
        // The rescued steps replace the model's.
        assert_eq!(fetched.recipe.steps.len(), 6);
        assert_eq!(fetched.recipe.steps[0].text, "Melt chocolate and butter.");
        assert!(fetched.recipe.metadata.disclaimer.is_none());
    }

    #[tokio::test]
    async fn whisper_rescue_stays_within_budget_and_discloses_partial_results() {
        // The steps-only call never finds enough steps, so every chunk
        // inside the 240 s budget is transcribed, and the partial
        // result carries a disclaimer.
        let mut llm = FakeProvider::new();
        llm.add_response("ordered preparation steps", r#"["Melt the chocolate."]"#);
        llm.add_response("recipe extraction engine", RECIPE_REPLY);

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.mp3");
        std::fs::write(&audio, b"fake").unwrap();

        let mut ctx = test_context(MockClient::new(), llm);
        ctx.downloader = Arc::new(
            FakeDownloader::new()
                .with_audio(audio)
                .with_info(
                    URL,
                    VideoInfo {
                        description: Some(INGREDIENTS_ONLY_DESCRIPTION.into()),
                        duration_secs: Some(700),
                        ..VideoInfo::default()
                    },
                ),
        );
        ctx.transcriber = Arc::new(FakeTranscriber::with_text("melting the chocolate now"));

        let fetched = import_youtube(&ctx, URL).await.unwrap();
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("steps_rescue_partial+openai")
        );
        assert_eq!(
            fetched.recipe.metadata.disclaimer.as_deref(),
            Some(PARTIAL_STEPS_DISCLAIMER)
        );
        // Two 90 s chunks fit in 240 s, the third would overshoot:
        // two transcription events, two rescue calls, one final call.
        let transcriptions = fetched
            .recipe
            .metadata
            .usage
            .iter()
            .filter(|u| u.audio_seconds.is_some())
            .count();
        assert_eq!(transcriptions, 2);
    }

    #[tokio::test]
    async fn no_description_signal_uses_subtitles_directly() {
        let llm = FakeProvider::with_response("recipe extraction engine", RECIPE_REPLY);
        let http = MockClient::new().with_html(
            "https://cdn/auto.vtt",
            "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\ntoday we bake brownies\n",
        );
        let mut ctx = test_context(http, llm);
        ctx.downloader = Arc::new(FakeDownloader::new().with_info(
            URL,
            VideoInfo {
                description: Some("new video is live!".into()),
                duration_secs: Some(300),
                subtitle_url: Some("https://cdn/auto.vtt".into()),
                subtitle_auto: true,
                ..VideoInfo::default()
            },
        ));

        let fetched = import_youtube(&ctx, URL).await.unwrap();
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("auto_subtitles+openai")
        );
    }
}
