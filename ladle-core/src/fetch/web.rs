//! Generic web import: schema.org first, model structuring second.

use std::path::PathBuf;

use crate::cache::FetchedImport;
use crate::error::ImportError;
use crate::extract::{extract_og_image, extract_schema_recipe, page_meta, structure_signals, visible_text};
use crate::importer::ImportContext;
use crate::rehost::rehost_image;
use crate::signals::SignalBundle;
use crate::types::ImportedRecipe;

/// Extensions accepted when attaching a directly linked video file.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "m4v"];

pub async fn import_web(ctx: &ImportContext, url: &str) -> Result<FetchedImport, ImportError> {
    let html = ctx.http.fetch_html(url).await?;
    let og_image = extract_og_image(&html);

    let mut recipe = match extract_schema_recipe(&html, url) {
        Some(recipe) => {
            tracing::debug!(url, "using schema.org recipe");
            recipe
        }
        None => {
            let meta = page_meta(&html);
            let bundle = SignalBundle {
                url: Some(url.to_string()),
                title_hint: meta.title,
                description_hint: meta.description,
                thumbnail_hint: og_image.clone(),
                page_text: Some(visible_text(&html)),
                ..SignalBundle::default()
            };
            let (mut recipe, usage) =
                structure_signals(ctx.llm.as_ref(), "web_openai", &bundle).await?;
            recipe.extracted_via = Some("openai_from_body".to_string());
            recipe.metadata.usage.push(usage);
            recipe
        }
    };

    if recipe.is_empty() {
        return Err(ImportError::EmptyExtraction);
    }

    recipe.source_platform = Some("web".to_string());
    if recipe.media_image_url.is_none() {
        recipe.media_image_url = og_image;
    }

    let local_media = attach_media(ctx, &mut recipe).await;
    Ok(FetchedImport {
        recipe,
        local_media,
    })
}

/// Best-effort local copies of linked media. A recipe with the media
/// still pointing at the source page is fine; a failed import is not.
async fn attach_media(ctx: &ImportContext, recipe: &mut ImportedRecipe) -> Option<PathBuf> {
    if recipe.media_local_path.is_some() {
        return recipe.media_local_path.clone();
    }

    if let Some(video_url) = recipe.media_video_url.clone() {
        if let Some(path) = download_video_file(ctx, &video_url).await {
            recipe.media_local_path = Some(path.clone());
            return Some(path);
        }
    }

    if let Some(image_url) = recipe.media_image_url.clone() {
        if image_url.starts_with("http") {
            match rehost_image(ctx.http.as_ref(), &image_url, &ctx.settings.media_dir).await {
                Ok(path) => {
                    recipe.media_local_path = Some(path.clone());
                    return Some(path);
                }
                Err(err) => {
                    tracing::debug!(url = %image_url, error = %err, "image rehost failed")
                }
            }
        }
    }
    None
}

/// Directly linked video files (schema.org contentUrl) are stored next
/// to the payload when the URL plainly points at a video.
async fn download_video_file(ctx: &ImportContext, video_url: &str) -> Option<PathBuf> {
    let lower = video_url.to_lowercase();
    if !lower.starts_with("http") {
        return None;
    }
    let extension = url::Url::parse(video_url)
        .ok()
        .and_then(|u| {
            PathBuf::from(u.path())
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
        })
        .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))?;

    let data = match ctx.http.fetch_bytes(video_url).await {
        Ok(data) => data,
        Err(err) => {
            tracing::debug!(url = video_url, error = %err, "video download failed");
            return None;
        }
    };

    let dir = ctx.settings.media_dir.join("videos");
    if tokio::fs::create_dir_all(&dir).await.is_err() {
        return None;
    }
    let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), extension));
    match tokio::fs::write(&path, &data).await {
        Ok(()) => {
            tracing::debug!(url = video_url, path = %path.display(), "stored video asset");
            Some(path)
        }
        Err(err) => {
            tracing::debug!(error = %err, "storing video asset failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testutil::test_context;
    use crate::http::MockClient;
    use crate::llm::FakeProvider;

    const SCHEMA_PAGE: &str = r#"<html><head>
        <script type="application/ld+json">
        {"@type": "Recipe", "name": "Apfelkuchen",
         "recipeIngredient": ["3 Äpfel", "200 g Mehl"],
         "recipeInstructions": ["Teig kneten.", "Backen."]}
        </script>
        </head><body></body></html>"#;

    #[tokio::test]
    async fn schema_page_needs_no_model_call() {
        let http = MockClient::new().with_html("https://ex.com/kuchen", SCHEMA_PAGE);
        let ctx = test_context(http, FakeProvider::new());
        let fetched = import_web(&ctx, "https://ex.com/kuchen").await.unwrap();
        assert_eq!(fetched.recipe.title, "Apfelkuchen");
        assert_eq!(fetched.recipe.extracted_via.as_deref(), Some("schema_org"));
        assert_eq!(fetched.recipe.source_platform.as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn plain_page_falls_back_to_model_call() {
        let html = "<html><head><title>Omas Linsensuppe</title></head>\
                    <body><p>200 g Linsen, 1 Zwiebel. Alles kochen.</p></body></html>";
        let reply = r#"{"title": "Omas Linsensuppe",
            "ingredients": [{"name": "Linsen", "amount": "200 g"}],
            "instructions": ["Alles kochen."]}"#;
        let http = MockClient::new().with_html("https://ex.com/suppe", html);
        let llm = FakeProvider::with_response("Linsensuppe", reply);
        let ctx = test_context(http, llm);

        let fetched = import_web(&ctx, "https://ex.com/suppe").await.unwrap();
        assert_eq!(fetched.recipe.title, "Omas Linsensuppe");
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("openai_from_body")
        );
        assert_eq!(fetched.recipe.metadata.usage.len(), 1);
    }

    #[tokio::test]
    async fn empty_extraction_is_rejected() {
        let html = "<html><body><p>Nothing about food here.</p></body></html>";
        let http = MockClient::new().with_html("https://ex.com/empty", html);
        let llm = FakeProvider::new().with_default_response(r#"{"title": "Nothing"}"#);
        let ctx = test_context(http, llm);

        let result = import_web(&ctx, "https://ex.com/empty").await;
        assert!(matches!(result, Err(ImportError::EmptyExtraction)));
    }
}
