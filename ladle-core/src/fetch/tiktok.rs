//! TikTok import: the caption is worthless, the audio track is not.
//!
//! The video download is required; a TikTok import without the
//! transcript has essentially no signal to work with.

use crate::cache::FetchedImport;
use crate::error::ImportError;
use crate::extract::structure_signals;
use crate::fetch::fetch_oembed;
use crate::importer::ImportContext;
use crate::signals::{Provenance, SignalBundle};
use crate::types::UsageEvent;

const OEMBED_ENDPOINT: &str = "https://www.tiktok.com/oembed";

pub async fn import_tiktok(ctx: &ImportContext, url: &str) -> Result<FetchedImport, ImportError> {
    let oembed = fetch_oembed(ctx.http.as_ref(), OEMBED_ENDPOINT, url).await;

    let media_dir = ctx.settings.media_dir.join("tiktok");
    let video = ctx.downloader.download_video(url, &media_dir).await?;
    let thumbnail = ctx.downloader.capture_thumbnail(&video).await?;
    let audio = ctx.downloader.extract_audio(&video).await?;
    let transcript = ctx.transcriber.transcribe(&audio).await?;

    // Audio length for cost accounting, from the probe metadata.
    let audio_seconds = match ctx.downloader.probe(url).await {
        Ok(info) => info.duration_secs,
        Err(err) => {
            tracing::debug!(url, error = %err, "duration probe failed");
            None
        }
    };

    let oembed = oembed.unwrap_or_default();
    let bundle = SignalBundle {
        url: Some(url.to_string()),
        title_hint: oembed.title,
        author_hint: oembed.author_name,
        thumbnail_hint: oembed.thumbnail_url,
        transcript: Some(transcript),
        ..SignalBundle::default()
    };

    let (mut recipe, usage) = structure_signals(ctx.llm.as_ref(), "tiktok_openai", &bundle).await?;
    if recipe.is_empty() {
        return Err(ImportError::EmptyExtraction);
    }

    let mut provenance = Provenance::new();
    provenance.record("yt-dlp");
    provenance.record("whisper");
    provenance.record("openai");

    recipe.source_platform = Some("tiktok".to_string());
    recipe.extracted_via = Some(provenance.label_or("openai"));
    recipe.media_video_url = Some(video.to_string_lossy().into_owned());
    recipe.media_local_path = Some(video.clone());
    recipe.media_image_url = Some(thumbnail.to_string_lossy().into_owned());

    recipe.metadata.usage.push(UsageEvent::transcription(
        "tiktok_whisper",
        ctx.llm.provider_name(),
        &ctx.settings.whisper_model,
        audio_seconds.unwrap_or(0),
    ));
    recipe.metadata.usage.push(usage);

    Ok(FetchedImport {
        recipe,
        local_media: Some(video),
    })
}
