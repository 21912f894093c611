//! Platform fetchers.
//!
//! One module per source platform. Every fetcher collects whatever raw
//! signals its platform exposes, runs them through the structured
//! extractor and hands back a [`FetchedImport`]. Durable state is the
//! cache layer's business, never a fetcher's.

mod instagram;
mod pinterest;
mod scan;
mod tiktok;
mod web;
mod youtube;

pub use instagram::import_instagram;
pub use pinterest::import_pinterest;
pub use scan::import_scan;
pub use tiktok::import_tiktok;
pub use web::import_web;
pub use youtube::import_youtube;

use serde::Deserialize;
use url::Url;

use crate::error::ImportError;
use crate::http::HttpClient;

/// Source platform of an import, decided from the URL host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    TikTok,
    Instagram,
    Pinterest,
    YouTube,
}

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Pinterest => "pinterest",
            Platform::YouTube => "youtube",
        }
    }
}

/// Decide which fetcher handles a URL. Anything that is not one of the
/// known social platforms goes through the generic web chain.
pub fn sniff_platform(url: &str) -> Result<Platform, ImportError> {
    let parsed = Url::parse(url).map_err(|e| ImportError::InvalidUrl(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ImportError::InvalidUrl(format!("URL has no host: {}", url)))?
        .to_lowercase();

    let platform = if host.contains("tiktok.com") {
        Platform::TikTok
    } else if host.contains("instagram.com") || host == "instagr.am" {
        Platform::Instagram
    } else if host.contains("pinterest.") || host == "pin.it" {
        Platform::Pinterest
    } else if host.contains("youtube.com") || host == "youtu.be" {
        Platform::YouTube
    } else {
        Platform::Web
    };
    Ok(platform)
}

/// The subset of an oEmbed reply the pipeline cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Oembed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Query a platform's oEmbed endpoint for a URL. oEmbed endpoints break
/// often and without notice, so failure is never fatal.
pub(crate) async fn fetch_oembed(
    http: &dyn HttpClient,
    endpoint_base: &str,
    target_url: &str,
) -> Option<Oembed> {
    let mut endpoint = Url::parse(endpoint_base).ok()?;
    endpoint
        .query_pairs_mut()
        .append_pair("url", target_url)
        .append_pair("format", "json");

    match http.fetch_json(endpoint.as_str()).await {
        Ok(value) => serde_json::from_value(value).ok(),
        Err(err) => {
            tracing::debug!(url = target_url, error = %err, "oEmbed lookup failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use crate::config::Settings;
    use crate::http::MockClient;
    use crate::importer::ImportContext;
    use crate::llm::FakeProvider;
    use crate::media::FakeDownloader;
    use crate::ocr::FakeOcr;
    use crate::render::FakeRenderer;
    use crate::speech::FakeTranscriber;

    /// A context wired entirely to fakes, with a per-test media dir.
    pub(crate) fn test_context(http: MockClient, llm: FakeProvider) -> ImportContext {
        ImportContext {
            settings: Settings {
                api_key: "test".into(),
                model: "test-model".into(),
                fallback_model: None,
                whisper_model: "whisper-1".into(),
                base_url: "http://localhost".into(),
                media_dir: std::env::temp_dir()
                    .join(format!("ladle-test-{}", uuid::Uuid::new_v4())),
                scan_max_images: 3,
                ytdlp_bin: "yt-dlp".into(),
                ffmpeg_bin: "ffmpeg".into(),
                tesseract_bin: "tesseract".into(),
            },
            http: Arc::new(http),
            llm: Arc::new(llm),
            llm_fallback: None,
            transcriber: Arc::new(FakeTranscriber::default()),
            ocr: Arc::new(FakeOcr::default()),
            renderer: Arc::new(FakeRenderer::new()),
            downloader: Arc::new(FakeDownloader::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_sniffing_by_host() {
        assert_eq!(
            sniff_platform("https://www.tiktok.com/@cook/video/1").unwrap(),
            Platform::TikTok
        );
        assert_eq!(
            sniff_platform("https://www.instagram.com/reel/xyz/").unwrap(),
            Platform::Instagram
        );
        assert_eq!(
            sniff_platform("https://pin.it/abc").unwrap(),
            Platform::Pinterest
        );
        assert_eq!(
            sniff_platform("https://www.pinterest.de/pin/123/").unwrap(),
            Platform::Pinterest
        );
        assert_eq!(
            sniff_platform("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            Platform::YouTube
        );
        assert_eq!(
            sniff_platform("https://www.chefkoch.de/rezepte/123/").unwrap(),
            Platform::Web
        );
    }

    #[test]
    fn urls_without_host_are_rejected() {
        assert!(matches!(
            sniff_platform("not a url"),
            Err(ImportError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn oembed_failure_is_none() {
        let http = crate::http::MockClient::new();
        let result = fetch_oembed(&http, "https://www.tiktok.com/oembed", "https://x").await;
        assert!(result.is_none());
    }
}
