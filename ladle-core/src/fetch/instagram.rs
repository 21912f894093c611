//! Instagram import: scrape anything that moves.
//!
//! Instagram exposes nothing reliably. The chain stacks best-effort
//! signals (oEmbed, downloaded audio transcript, rendered page meta and
//! caption, screenshot OCR) and lets the structuring call sort out
//! whatever arrived.

use scraper::{Html, Selector};

use crate::cache::FetchedImport;
use crate::error::ImportError;
use crate::extract::{page_meta, pick_richer, structure_signals, PageMeta};
use crate::fetch::fetch_oembed;
use crate::importer::ImportContext;
use crate::signals::{Provenance, SignalBundle};
use crate::text::{clean_text, truncate_chars};
use crate::types::UsageEvent;

const OEMBED_ENDPOINT: &str = "https://api.instagram.com/oembed/";

/// Caption text handed to the model is capped; reel captions are
/// sometimes novels of hashtags.
const MAX_CAPTION_CHARS: usize = 8_000;

/// OCR text cap for the screenshot rescue.
const MAX_OCR_CHARS: usize = 5_000;

pub async fn import_instagram(
    ctx: &ImportContext,
    url: &str,
) -> Result<FetchedImport, ImportError> {
    let oembed = fetch_oembed(ctx.http.as_ref(), OEMBED_ENDPOINT, url).await;

    // Video, audio and transcript are all optional.
    let media_dir = ctx.settings.media_dir.join("instagram");
    let video = match ctx.downloader.download_video(url, &media_dir).await {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::debug!(url, error = %err, "video download failed, continuing without");
            None
        }
    };

    let mut transcript = None;
    let mut audio_seconds = None;
    if let Some(video_path) = &video {
        match ctx.downloader.extract_audio(video_path).await {
            Ok(audio) => match ctx.transcriber.transcribe(&audio).await {
                Ok(text) => {
                    transcript = Some(text);
                    audio_seconds = ctx
                        .downloader
                        .probe(url)
                        .await
                        .ok()
                        .and_then(|info| info.duration_secs);
                }
                Err(err) => tracing::debug!(url, error = %err, "transcription failed"),
            },
            Err(err) => tracing::debug!(url, error = %err, "audio extraction failed"),
        }
    }

    // Rendered-page rescue: meta tags and the longest caption text.
    let (meta, caption) = match ctx.render_html(url).await {
        Ok(html) => {
            let meta = page_meta(&html);
            let caption = best_caption(&html, &meta);
            (meta, caption)
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "page render failed");
            (PageMeta::default(), None)
        }
    };

    let oembed_ok = oembed.is_some();
    let oembed = oembed.unwrap_or_default();
    let title_hint = oembed
        .title
        .clone()
        .or_else(|| meta.title.clone())
        .or_else(|| Some("Recipe from Instagram".to_string()));
    let thumbnail = oembed.thumbnail_url.clone().or_else(|| meta.image.clone());

    let bundle = SignalBundle {
        url: Some(url.to_string()),
        title_hint,
        description_hint: meta.description.clone(),
        author_hint: oembed.author_name.clone(),
        thumbnail_hint: thumbnail,
        caption_text: caption.clone(),
        transcript: transcript.clone(),
        ..SignalBundle::default()
    };

    let (recipe, usage) = structure_signals(ctx.llm.as_ref(), "instagram_openai", &bundle).await?;
    let mut usage_events = Vec::new();
    if transcript.is_some() {
        usage_events.push(UsageEvent::transcription(
            "instagram_whisper",
            ctx.llm.provider_name(),
            &ctx.settings.whisper_model,
            audio_seconds.unwrap_or(0),
        ));
    }
    usage_events.push(usage);

    // When the result is missing one side of the recipe, OCR a
    // screenshot of the post and retry with that extra signal, keeping
    // whichever result turned out richer.
    let mut used_ocr = false;
    let mut recipe = recipe;
    if !recipe.has_ingredients() || !recipe.has_steps() {
        if let Some((ocr_recipe, ocr_usage)) = ocr_rescue(ctx, url, &bundle).await {
            usage_events.push(ocr_usage);
            let before = recipe.signal_count();
            recipe = pick_richer(recipe, ocr_recipe);
            used_ocr = recipe.signal_count() > before;
        }
    }

    if recipe.is_empty() {
        return Err(ImportError::EmptyExtraction);
    }

    let mut provenance = Provenance::new();
    if transcript.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        provenance.record("whisper");
    }
    if oembed_ok {
        provenance.record("oembed");
    }
    if caption.is_some() {
        provenance.record("caption");
    }
    if meta.title.is_some() || meta.description.is_some() {
        provenance.record("og_meta");
    }
    if used_ocr {
        provenance.record("ocr");
    }

    recipe.source_platform = Some("instagram".to_string());
    recipe.extracted_via = Some(provenance.label_or("openai_no_signals"));
    if let Some(video_path) = &video {
        recipe.media_video_url = Some(video_path.to_string_lossy().into_owned());
        recipe.media_local_path = Some(video_path.clone());
    }
    recipe.metadata.usage.extend(usage_events);

    Ok(FetchedImport {
        recipe,
        local_media: video,
    })
}

/// Screenshot the post, OCR it and re-run structuring with the OCR text
/// as an extra signal.
async fn ocr_rescue(
    ctx: &ImportContext,
    url: &str,
    bundle: &SignalBundle,
) -> Option<(crate::types::ImportedRecipe, UsageEvent)> {
    let png = match ctx.screenshot(url).await {
        Ok(png) => png,
        Err(err) => {
            tracing::debug!(url, error = %err, "screenshot failed, skipping OCR rescue");
            return None;
        }
    };

    let dir = ctx.settings.media_dir.join("instagram");
    tokio::fs::create_dir_all(&dir).await.ok()?;
    let path = dir.join(format!("{}.png", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, &png).await.ok()?;

    let text = match ctx.ocr.recognize(&path).await {
        Ok(text) => clean_text(&text),
        Err(err) => {
            tracing::debug!(url, error = %err, "OCR failed");
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }

    let mut retry = bundle.clone();
    retry.ocr_text = Some(truncate_chars(&text, MAX_OCR_CHARS).to_string());
    match structure_signals(ctx.llm.as_ref(), "instagram_openai_ocr", &retry).await {
        Ok(result) => Some(result),
        Err(err) => {
            tracing::debug!(url, error = %err, "OCR retry structuring failed");
            None
        }
    }
}

/// The longest coherent caption candidate: the post's article text,
/// falling back to the meta description.
fn best_caption(html: &str, meta: &PageMeta) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();

    if let Ok(selector) = Selector::parse("article") {
        let document = Html::parse_document(html);
        if let Some(article) = document.select(&selector).next() {
            let text = clean_text(&article.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                candidates.push(text);
            }
        }
    }
    if let Some(description) = &meta.description {
        candidates.push(description.clone());
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
    candidates
        .into_iter()
        .next()
        .map(|c| truncate_chars(&c, MAX_CAPTION_CHARS).to_string())
}
