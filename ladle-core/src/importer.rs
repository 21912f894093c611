//! Pipeline entry points.
//!
//! [`ImportContext`] bundles every external seam behind `Arc`'d trait
//! objects; it is built once and threaded through the fetchers, so
//! nothing in the pipeline reaches for global state. [`Importer`] adds
//! the cache store on top and exposes the user-facing operations.

use std::sync::Arc;

use crate::cache::{import_with_cache, CacheOutcome, CacheStore, FetchedImport};
use crate::config::Settings;
use crate::error::ImportError;
use crate::fetch::{
    import_instagram, import_pinterest, import_scan, import_tiktok, import_web, import_youtube,
    sniff_platform, Platform,
};
use crate::http::{HttpClient, WebClient};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::media::{VideoDownloader, YtDlpDownloader};
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::render::{ChromeRenderer, PageRenderer};
use crate::speech::{Transcriber, WhisperTranscriber};

/// Every external collaborator the fetchers need, behind trait objects.
#[derive(Clone)]
pub struct ImportContext {
    pub settings: Settings,
    pub http: Arc<dyn HttpClient>,
    pub llm: Arc<dyn LlmProvider>,
    /// Second-choice model for the scan chain, tried once when the
    /// primary structuring call fails.
    pub llm_fallback: Option<Arc<dyn LlmProvider>>,
    pub transcriber: Arc<dyn Transcriber>,
    pub ocr: Arc<dyn OcrEngine>,
    pub renderer: Arc<dyn PageRenderer>,
    pub downloader: Arc<dyn VideoDownloader>,
}

impl ImportContext {
    /// Build a production context from environment configuration.
    pub fn from_env() -> Result<Self, ImportError> {
        let settings = Settings::from_env()
            .map_err(|e| ImportError::InvalidInput(e.to_string()))?;
        let http = WebClient::new().map_err(|e| ImportError::Fetch(e.to_string()))?;

        Ok(Self {
            http: Arc::new(http),
            llm: Arc::new(OpenAiProvider::from_settings(&settings)),
            llm_fallback: fallback_provider(&settings),
            transcriber: Arc::new(WhisperTranscriber::from_settings(&settings)),
            ocr: Arc::new(TesseractOcr::new(settings.tesseract_bin.clone())),
            renderer: Arc::new(ChromeRenderer::new()),
            downloader: Arc::new(YtDlpDownloader::from_settings(&settings)),
            settings,
        })
    }

    /// Render a page off the async runtime; rendering blocks on a real
    /// browser.
    pub(crate) async fn render_html(&self, url: &str) -> Result<String, ImportError> {
        let renderer = self.renderer.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || renderer.render_html(&url))
            .await
            .map_err(|e| ImportError::Tool {
                tool: "chrome",
                message: e.to_string(),
            })?
    }

    pub(crate) async fn screenshot(&self, url: &str) -> Result<Vec<u8>, ImportError> {
        let renderer = self.renderer.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || renderer.screenshot(&url))
            .await
            .map_err(|e| ImportError::Tool {
                tool: "chrome",
                message: e.to_string(),
            })?
    }
}

/// The import pipeline: platform dispatch plus the cache wrapper.
pub struct Importer {
    ctx: ImportContext,
    store: Arc<dyn CacheStore>,
}

impl Importer {
    pub fn new(ctx: ImportContext, store: Arc<dyn CacheStore>) -> Self {
        Self { ctx, store }
    }

    pub fn context(&self) -> &ImportContext {
        &self.ctx
    }

    /// Run the right platform chain for a URL, without touching the
    /// cache.
    pub async fn import_url(&self, url: &str) -> Result<FetchedImport, ImportError> {
        let platform = sniff_platform(url)?;
        tracing::info!(url, platform = platform.label(), "importing");
        match platform {
            Platform::Web => import_web(&self.ctx, url).await,
            Platform::TikTok => import_tiktok(&self.ctx, url).await,
            Platform::Instagram => import_instagram(&self.ctx, url).await,
            Platform::Pinterest => import_pinterest(&self.ctx, url).await,
            Platform::YouTube => import_youtube(&self.ctx, url).await,
        }
    }

    /// Import a URL through the cache: fresh entries are reused, stale
    /// ones refetched, and a failed refetch falls back to the stale
    /// entry where the failure allows it.
    pub async fn import_cached(&self, url: &str) -> Result<CacheOutcome, ImportError> {
        let platform = sniff_platform(url)?;
        import_with_cache(self.store.as_ref(), url, platform.label(), |normalized| {
            let url = normalized;
            async move { self.import_url(&url).await }
        })
        .await
    }

    /// Structure one or more scanned recipe photos.
    pub async fn import_scan(&self, images: &[Vec<u8>]) -> Result<FetchedImport, ImportError> {
        import_scan(&self.ctx, images).await
    }
}

/// Second-choice provider for the scan chain, present only when a
/// fallback model is configured. Shares the key and endpoint of the
/// primary.
fn fallback_provider(settings: &Settings) -> Option<Arc<dyn LlmProvider>> {
    settings.fallback_model.clone().map(|model| {
        Arc::new(OpenAiProvider::new(
            settings.api_key.clone(),
            model,
            settings.base_url.clone(),
        )) as Arc<dyn LlmProvider>
    })
}
