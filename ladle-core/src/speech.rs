//! Audio transcription seam.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Settings;
use crate::error::ImportError;

/// Trait for speech-to-text backends.
#[async_trait]
pub trait Transcriber: Send + Sync + fmt::Debug {
    /// Transcribe an audio file to plain text.
    async fn transcribe(&self, audio: &Path) -> Result<String, ImportError>;
}

/// Whisper transcription via an OpenAI-compatible endpoint.
#[derive(Debug)]
pub struct WhisperTranscriber {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.api_key.clone(),
            settings.whisper_model.clone(),
            settings.base_url.clone(),
        )
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, ImportError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        tracing::debug!(path = %audio.display(), "transcribing audio");
        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImportError::Transcription(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ImportError::Transcription(e.to_string()))?;

        if !status.is_success() {
            return Err(ImportError::Transcription(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).map_err(|e| ImportError::Transcription(e.to_string()))?;
        Ok(parsed.text)
    }
}

/// Fake transcriber returning a fixed transcript.
#[derive(Debug, Default)]
pub struct FakeTranscriber {
    text: String,
}

impl FakeTranscriber {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<String, ImportError> {
        Ok(self.text.clone())
    }
}
