//! Scanned-photo import: cookbook pages and recipe cards.
//!
//! Photos are normalized before OCR; phone uploads arrive huge and
//! rotated, and recognition quality degrades on both. Each image is
//! re-encoded as a bounded JPEG, stored locally, and read by the OCR
//! engine; the concatenated text goes through one structuring call.

use std::io::Cursor;
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use uuid::Uuid;

use crate::cache::FetchedImport;
use crate::error::ImportError;
use crate::extract::structure_signals;
use crate::importer::ImportContext;
use crate::signals::SignalBundle;
use crate::types::ImportedRecipe;

/// Longest edge after preprocessing.
const MAX_IMAGE_EDGE: u32 = 1600;

/// JPEG quality for the re-encode.
const JPEG_QUALITY: u8 = 80;

pub async fn import_scan(
    ctx: &ImportContext,
    images: &[Vec<u8>],
) -> Result<FetchedImport, ImportError> {
    if images.is_empty() {
        return Err(ImportError::InvalidInput("no images provided".to_string()));
    }
    if images.len() > ctx.settings.scan_max_images {
        return Err(ImportError::InvalidInput(format!(
            "too many images: {} (max {})",
            images.len(),
            ctx.settings.scan_max_images
        )));
    }

    let scan_dir = ctx.settings.media_dir.join("scan");
    tokio::fs::create_dir_all(&scan_dir).await?;

    let mut stored: Vec<PathBuf> = Vec::with_capacity(images.len());
    let mut texts: Vec<String> = Vec::with_capacity(images.len());
    for (index, data) in images.iter().enumerate() {
        let optimized = preprocess_image(data)?;
        let path = scan_dir.join(format!("scan_{}.jpg", Uuid::new_v4()));
        tokio::fs::write(&path, &optimized).await?;

        let text = ctx.ocr.recognize(&path).await?;
        let text = text.trim().to_string();
        tracing::debug!(index, path = %path.display(), chars = text.len(), "scanned image");
        if !text.is_empty() {
            texts.push(text);
        }
        stored.push(path);
    }

    let combined = texts.join("\n\n");
    if combined.trim().is_empty() {
        return Err(ImportError::Ocr(
            "no text recognized in scanned images".to_string(),
        ));
    }

    let bundle = SignalBundle {
        ocr_text: Some(combined),
        ..SignalBundle::default()
    };
    let (mut recipe, usage) = structure_with_fallback(ctx, &bundle).await?;
    recipe.metadata.usage.push(usage);

    if recipe.is_empty() {
        return Err(ImportError::EmptyExtraction);
    }

    let first_image = stored.first().cloned();
    recipe.source_platform = Some("scan".to_string());
    recipe.source_url = Some("scan://local".to_string());
    recipe.source_domain = Some("scan".to_string());
    recipe.extracted_via = Some("scan+ocr+openai".to_string());
    recipe.media_image_url = first_image
        .as_ref()
        .map(|p| p.display().to_string());
    recipe.media_local_path = first_image.clone();

    Ok(FetchedImport {
        recipe,
        local_media: first_image,
    })
}

/// One structuring call, retried once on the fallback model when one
/// is configured.
async fn structure_with_fallback(
    ctx: &ImportContext,
    bundle: &SignalBundle,
) -> Result<(ImportedRecipe, crate::types::UsageEvent), ImportError> {
    match structure_signals(ctx.llm.as_ref(), "scan_openai", bundle).await {
        Ok(result) => Ok(result),
        Err(err) => match &ctx.llm_fallback {
            Some(fallback) => {
                tracing::warn!(error = %err, "primary structuring failed, retrying on fallback model");
                structure_signals(fallback.as_ref(), "scan_openai_fallback", bundle).await
            }
            None => Err(err),
        },
    }
}

/// Decode, orient within bounds, and re-encode a photo as JPEG.
fn preprocess_image(data: &[u8]) -> Result<Vec<u8>, ImportError> {
    if data.is_empty() {
        return Err(ImportError::InvalidInput("uploaded image is empty".to_string()));
    }
    let image = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImportError::InvalidInput(format!("failed to read image: {}", e)))?
        .decode()
        .map_err(|e| ImportError::InvalidInput(format!("failed to decode image: {}", e)))?;

    let image = if image.width().max(image.height()) > MAX_IMAGE_EDGE {
        image.resize(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE, FilterType::Lanczos3)
    } else {
        image
    };
    let image = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|e| ImportError::InvalidInput(format!("failed to encode image: {}", e)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testutil::test_context;
    use crate::http::MockClient;
    use crate::llm::FakeProvider;
    use crate::ocr::FakeOcr;
    use std::sync::Arc;

    // Smallest valid 1x1 PNG.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    const REPLY: &str = r#"{"title": "Omas Apfelkuchen",
        "ingredients": [{"name": "Äpfel", "amount": "4"},
                        {"name": "Mehl", "amount": "300 g"}],
        "instructions": ["Teig kneten.", "Äpfel schälen.", "Backen."]}"#;

    #[tokio::test]
    async fn rejects_empty_and_oversized_batches() {
        let ctx = test_context(MockClient::new(), FakeProvider::new());
        assert!(matches!(
            import_scan(&ctx, &[]).await,
            Err(ImportError::InvalidInput(_))
        ));

        let too_many = vec![TINY_PNG.to_vec(); ctx.settings.scan_max_images + 1];
        assert!(matches!(
            import_scan(&ctx, &too_many).await,
            Err(ImportError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn recognized_text_is_structured() {
        let llm = FakeProvider::with_response("300 g Mehl", REPLY);
        let mut ctx = test_context(MockClient::new(), llm);
        ctx.ocr = Arc::new(FakeOcr::with_text(
            "Omas Apfelkuchen\n4 Äpfel, 300 g Mehl\nTeig kneten. Backen.",
        ));

        let fetched = import_scan(&ctx, &[TINY_PNG.to_vec()]).await.unwrap();
        assert_eq!(fetched.recipe.title, "Omas Apfelkuchen");
        assert_eq!(
            fetched.recipe.extracted_via.as_deref(),
            Some("scan+ocr+openai")
        );
        assert_eq!(fetched.recipe.source_url.as_deref(), Some("scan://local"));
        assert_eq!(fetched.recipe.source_domain.as_deref(), Some("scan"));
        assert!(fetched.local_media.as_ref().unwrap().exists());
        assert_eq!(fetched.recipe.media_local_path, fetched.local_media);
    }

    #[tokio::test]
    async fn blank_scans_are_an_ocr_error() {
        let mut ctx = test_context(MockClient::new(), FakeProvider::new());
        ctx.ocr = Arc::new(FakeOcr::with_text("   "));
        assert!(matches!(
            import_scan(&ctx, &[TINY_PNG.to_vec()]).await,
            Err(ImportError::Ocr(_))
        ));
    }

    #[tokio::test]
    async fn fallback_model_rescues_a_failed_call() {
        // Primary has no matching response; the fallback does.
        let mut ctx = test_context(MockClient::new(), FakeProvider::new());
        ctx.llm_fallback = Some(Arc::new(FakeProvider::with_response("300 g Mehl", REPLY)));
        ctx.ocr = Arc::new(FakeOcr::with_text("4 Äpfel, 300 g Mehl"));

        let fetched = import_scan(&ctx, &[TINY_PNG.to_vec()]).await.unwrap();
        assert_eq!(fetched.recipe.title, "Omas Apfelkuchen");
    }

    #[test]
    fn preprocessing_yields_jpeg() {
        let out = preprocess_image(TINY_PNG).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert!(preprocess_image(b"not an image").is_err());
        assert!(preprocess_image(b"").is_err());
    }
}
