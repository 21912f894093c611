//! Pipeline configuration from environment variables.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for structured extraction.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default Whisper model for audio transcription.
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

/// Default number of scanned photos accepted per import.
pub const DEFAULT_SCAN_MAX_IMAGES: usize = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the OpenAI-compatible endpoint.
    pub api_key: String,
    /// Model used for structured extraction.
    pub model: String,
    /// Second-choice extraction model, tried when the primary fails.
    pub fallback_model: Option<String>,
    /// Model used for Whisper transcription.
    pub whisper_model: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Working directory for downloaded media.
    pub media_dir: PathBuf,
    /// Maximum photos accepted by the scan chain.
    pub scan_max_images: usize,
    /// Path to the yt-dlp binary.
    pub ytdlp_bin: String,
    /// Path to the ffmpeg binary.
    pub ffmpeg_bin: String,
    /// Path to the tesseract binary.
    pub tesseract_bin: String,
}

impl Settings {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `OPENAI_API_KEY`: API key for the OpenAI-compatible endpoint
    ///
    /// Optional:
    /// - `LADLE_MODEL`: Extraction model (default: "gpt-4o-mini")
    /// - `LADLE_FALLBACK_MODEL`: Second-choice extraction model (default: none)
    /// - `LADLE_WHISPER_MODEL`: Transcription model (default: "whisper-1")
    /// - `LADLE_BASE_URL`: API base URL (default: "https://api.openai.com/v1")
    /// - `LADLE_MEDIA_DIR`: Media working dir (default: "~/.ladle/media")
    /// - `LADLE_SCAN_MAX_IMAGES`: Photos per scan import (default: 3)
    /// - `LADLE_YTDLP_BIN`, `LADLE_FFMPEG_BIN`, `LADLE_TESSERACT_BIN`:
    ///   external tool paths (defaults: "yt-dlp", "ffmpeg", "tesseract")
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let model = env::var("LADLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let fallback_model = env::var("LADLE_FALLBACK_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let whisper_model =
            env::var("LADLE_WHISPER_MODEL").unwrap_or_else(|_| DEFAULT_WHISPER_MODEL.to_string());

        let base_url = env::var("LADLE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let media_dir = env::var("LADLE_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_media_dir());

        let scan_max_images = env::var("LADLE_SCAN_MAX_IMAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SCAN_MAX_IMAGES);

        let ytdlp_bin = env::var("LADLE_YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string());
        let ffmpeg_bin = env::var("LADLE_FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());
        let tesseract_bin =
            env::var("LADLE_TESSERACT_BIN").unwrap_or_else(|_| "tesseract".to_string());

        Ok(Self {
            api_key,
            model,
            fallback_model,
            whisper_model,
            base_url,
            media_dir,
            scan_max_images,
            ytdlp_bin,
            ffmpeg_bin,
            tesseract_bin,
        })
    }

    /// Get the default media directory: ~/.ladle/media
    pub fn default_media_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".ladle").join("media"))
            .unwrap_or_else(|| PathBuf::from("data/media"))
    }
}
