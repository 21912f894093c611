//! End-to-end pipeline tests against the public API.
//!
//! Everything external is faked; these cover the dispatch, extraction
//! and cache layers wired together the way the CLI wires them.

use std::path::PathBuf;
use std::sync::Arc;

use ladle_core::config::Settings;
use ladle_core::http::MockClient;
use ladle_core::llm::FakeProvider;
use ladle_core::media::FakeDownloader;
use ladle_core::ocr::FakeOcr;
use ladle_core::render::FakeRenderer;
use ladle_core::speech::FakeTranscriber;
use ladle_core::{ImportContext, ImportError, Importer, MemoryStore};

fn fake_settings() -> Settings {
    Settings {
        api_key: "test".into(),
        model: "test-model".into(),
        fallback_model: None,
        whisper_model: "whisper-1".into(),
        base_url: "http://localhost".into(),
        media_dir: std::env::temp_dir().join(format!("ladle-it-{}", uuid::Uuid::new_v4())),
        scan_max_images: 3,
        ytdlp_bin: "yt-dlp".into(),
        ffmpeg_bin: "ffmpeg".into(),
        tesseract_bin: "tesseract".into(),
    }
}

fn fake_context(http: MockClient, llm: FakeProvider) -> ImportContext {
    ImportContext {
        settings: fake_settings(),
        http: Arc::new(http),
        llm: Arc::new(llm),
        llm_fallback: None,
        transcriber: Arc::new(FakeTranscriber::default()),
        ocr: Arc::new(FakeOcr::default()),
        renderer: Arc::new(FakeRenderer::new()),
        downloader: Arc::new(FakeDownloader::new()),
    }
}

const SCHEMA_PAGE: &str = r#"<html><head>
    <script type="application/ld+json">
    {"@type": "Recipe", "name": "Linseneintopf",
     "description": "Deftiger Eintopf",
     "recipeIngredient": ["250 g Linsen", "2 Karotten", "1 Zwiebel"],
     "recipeInstructions": ["Gemüse würfeln.", "Alles köcheln lassen.", "Abschmecken."]}
    </script></head><body></body></html>"#;

#[tokio::test]
async fn web_import_is_cached_across_url_variants() {
    let http = MockClient::new().with_html("https://blog.example/linsen", SCHEMA_PAGE);
    let importer = Importer::new(
        fake_context(http, FakeProvider::new()),
        Arc::new(MemoryStore::new()),
    );

    let first = importer
        .import_cached("https://blog.example/linsen")
        .await
        .unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.payload.title, "Linseneintopf");
    assert_eq!(first.payload.extracted_via.as_deref(), Some("schema_org"));
    assert_eq!(first.language, "de");

    // Trailing slash and tracking params collapse to the same entry.
    let second = importer
        .import_cached("https://blog.example/linsen/?utm_source=app")
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(second.entry.id, first.entry.id);
}

#[tokio::test]
async fn urls_without_a_host_are_rejected() {
    let importer = Importer::new(
        fake_context(MockClient::new(), FakeProvider::new()),
        Arc::new(MemoryStore::new()),
    );
    assert!(matches!(
        importer.import_cached("not a url").await,
        Err(ImportError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn fetch_failure_without_cache_surfaces() {
    let importer = Importer::new(
        fake_context(MockClient::new(), FakeProvider::new()),
        Arc::new(MemoryStore::new()),
    );
    // Nothing mocked: the fetch fails and there is no entry to fall
    // back to.
    assert!(importer
        .import_cached("https://blog.example/missing")
        .await
        .is_err());
}

#[tokio::test]
async fn scan_import_goes_through_the_same_extractor() {
    // Smallest valid 1x1 PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];
    const REPLY: &str = r#"{"title": "Kartoffelsuppe",
        "ingredients": [{"name": "Kartoffeln", "amount": "1 kg"}],
        "instructions": ["Kartoffeln kochen.", "Pürieren."]}"#;

    let mut ctx = fake_context(
        MockClient::new(),
        FakeProvider::with_response("1 kg Kartoffeln", REPLY),
    );
    ctx.ocr = Arc::new(FakeOcr::with_text("Kartoffelsuppe\n1 kg Kartoffeln"));
    let importer = Importer::new(ctx, Arc::new(MemoryStore::new()));

    let fetched = importer.import_scan(&[TINY_PNG.to_vec()]).await.unwrap();
    assert_eq!(fetched.recipe.title, "Kartoffelsuppe");
    assert_eq!(fetched.recipe.source_platform.as_deref(), Some("scan"));
    let media: Option<PathBuf> = fetched.local_media;
    assert!(media.is_some());
}
