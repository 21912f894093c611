//! OCR seam for reading text out of video frames and photos.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::ImportError;

/// Trait for OCR backends.
#[async_trait]
pub trait OcrEngine: Send + Sync + fmt::Debug {
    /// Recognize text in an image file.
    async fn recognize(&self, image: &Path) -> Result<String, ImportError>;
}

/// OCR via the tesseract binary.
#[derive(Debug)]
pub struct TesseractOcr {
    bin: String,
    /// Tesseract language codes, e.g. "deu+eng".
    languages: String,
}

impl TesseractOcr {
    pub fn new(bin: String) -> Self {
        Self {
            bin,
            languages: "deu+eng".to_string(),
        }
    }

    pub fn with_languages(mut self, languages: &str) -> Self {
        self.languages = languages.to_string();
        self
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String, ImportError> {
        // "stdout" as the output base makes tesseract print the text
        // instead of writing a file.
        let output = tokio::process::Command::new(&self.bin)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ImportError::ToolMissing(self.bin.clone()),
                _ => ImportError::Ocr(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(ImportError::Ocr(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fake OCR engine returning a fixed text.
#[derive(Debug, Default)]
pub struct FakeOcr {
    text: String,
}

impl FakeOcr {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(&self, _image: &Path) -> Result<String, ImportError> {
        Ok(self.text.clone())
    }
}
