//! Image fetching, validation and local storage.
//!
//! Recipe images referenced by source pages disappear; imports keep a
//! local copy next to the structured payload.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{ImageFormat, ImageReader};
use uuid::Uuid;

use crate::error::ImportError;
use crate::http::HttpClient;
use crate::llm::ImageInput;

/// Allowed image formats for recipe photos.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Maximum file size for images (10MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Validate image data: check format is allowed and detect content type.
///
/// Returns the content type on success (e.g., "image/jpeg").
pub fn validate_image(data: &[u8]) -> Result<String, ImportError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImportError::InvalidInput(format!("Failed to read image: {}", e)))?;

    let format = reader
        .format()
        .ok_or_else(|| ImportError::InvalidInput("Could not detect image format".to_string()))?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ImportError::InvalidInput(format!(
            "Unsupported image format: {:?}. Allowed: JPEG, PNG, GIF, WebP",
            format
        )));
    }

    Ok(format.to_mime_type().to_string())
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Fetch an image and store a validated local copy under `media_dir`.
pub async fn rehost_image<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    media_dir: &Path,
) -> Result<PathBuf, ImportError> {
    let data = client.fetch_bytes(url).await?;

    if data.len() > MAX_FILE_SIZE {
        return Err(ImportError::InvalidInput(format!(
            "Image too large: {} bytes (max {})",
            data.len(),
            MAX_FILE_SIZE
        )));
    }

    let content_type = validate_image(&data)?;

    tokio::fs::create_dir_all(media_dir).await?;
    let path = media_dir.join(format!("{}.{}", Uuid::new_v4(), extension_for(&content_type)));
    tokio::fs::write(&path, &data).await?;
    tracing::debug!(url, path = %path.display(), "rehosted image");
    Ok(path)
}

/// Load an image file as a base64 vision input.
pub async fn image_input_from_file(path: &Path) -> Result<ImageInput, ImportError> {
    let data = tokio::fs::read(path).await?;
    let media_type = validate_image(&data)?;
    Ok(ImageInput {
        media_type,
        data: BASE64.encode(&data),
    })
}

/// Wrap raw image bytes as a base64 vision input.
pub fn image_input_from_bytes(data: &[u8]) -> Result<ImageInput, ImportError> {
    let media_type = validate_image(data)?;
    Ok(ImageInput {
        media_type,
        data: BASE64.encode(data),
    })
}
