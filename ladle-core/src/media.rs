//! Video metadata and audio download via yt-dlp and ffmpeg.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ImportError;

/// Caption languages considered when picking a subtitle track, in
/// preference order.
const SUBTITLE_LANGUAGES: &[&str] = &["de", "de-DE", "en", "en-US", "en-GB"];

/// Metadata for a video, as reported by the downloader.
#[derive(Debug, Clone, Default)]
pub struct VideoInfo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_secs: Option<u64>,
    pub uploader: Option<String>,
    pub thumbnail_url: Option<String>,
    /// URL of the best matching caption track (WebVTT), if any.
    pub subtitle_url: Option<String>,
    /// True when the caption track is auto-generated.
    pub subtitle_auto: bool,
}

/// Trait for video download backends.
#[async_trait]
pub trait VideoDownloader: Send + Sync + fmt::Debug {
    /// Fetch metadata without downloading the video.
    async fn probe(&self, url: &str) -> Result<VideoInfo, ImportError>;

    /// Download the full video into `out_dir`, returning its path.
    async fn download_video(&self, url: &str, out_dir: &Path) -> Result<PathBuf, ImportError>;

    /// Download the audio track as an mp3 file into `out_dir`.
    async fn download_audio(&self, url: &str, out_dir: &Path) -> Result<PathBuf, ImportError>;

    /// Extract the audio track of a local video as 16 kHz mono mp3.
    async fn extract_audio(&self, video: &Path) -> Result<PathBuf, ImportError>;

    /// Grab a frame one second in as a JPEG thumbnail.
    async fn capture_thumbnail(&self, video: &Path) -> Result<PathBuf, ImportError>;

    /// Cut a chunk out of an audio file, returning the chunk's path.
    async fn cut_audio_chunk(
        &self,
        audio: &Path,
        start_secs: u64,
        duration_secs: u64,
    ) -> Result<PathBuf, ImportError>;
}

/// Production downloader shelling out to yt-dlp and ffmpeg.
#[derive(Debug)]
pub struct YtDlpDownloader {
    ytdlp_bin: String,
    ffmpeg_bin: String,
}

impl YtDlpDownloader {
    pub fn new(ytdlp_bin: String, ffmpeg_bin: String) -> Self {
        Self {
            ytdlp_bin,
            ffmpeg_bin,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ytdlp_bin.clone(), settings.ffmpeg_bin.clone())
    }

    async fn run(
        &self,
        bin: &str,
        tool: &'static str,
        args: &[&str],
    ) -> Result<Vec<u8>, ImportError> {
        let output = tokio::process::Command::new(bin)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ImportError::ToolMissing(bin.to_string()),
                _ => ImportError::Tool {
                    tool,
                    message: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(ImportError::Tool {
                tool,
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

/// Pick the best caption track from a yt-dlp subtitle map.
fn pick_subtitle(tracks: &Value) -> Option<String> {
    let map = tracks.as_object()?;
    for lang in SUBTITLE_LANGUAGES {
        if let Some(entries) = map.get(*lang).and_then(Value::as_array) {
            // Prefer WebVTT, fall back to whatever comes first.
            let vtt = entries
                .iter()
                .find(|e| e.get("ext").and_then(Value::as_str) == Some("vtt"))
                .or_else(|| entries.first());
            if let Some(url) = vtt.and_then(|e| e.get("url")).and_then(Value::as_str) {
                return Some(url.to_string());
            }
        }
    }
    None
}

fn info_from_json(json: &Value) -> VideoInfo {
    let manual = json.get("subtitles").and_then(pick_subtitle);
    let auto = json.get("automatic_captions").and_then(pick_subtitle);
    let subtitle_auto = manual.is_none() && auto.is_some();

    VideoInfo {
        id: json
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        title: json
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string),
        description: json
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        duration_secs: json.get("duration").and_then(Value::as_f64).map(|d| d as u64),
        uploader: json
            .get("uploader")
            .and_then(Value::as_str)
            .map(str::to_string),
        thumbnail_url: json
            .get("thumbnail")
            .and_then(Value::as_str)
            .map(str::to_string),
        subtitle_url: manual.or(auto),
        subtitle_auto,
    }
}

/// Strip WebVTT cue timing and markup, returning deduplicated caption
/// text. Auto-generated tracks repeat lines across overlapping cues.
pub fn strip_vtt(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for raw in vtt.lines() {
        let line = raw.trim();
        if line.is_empty()
            || line == "WEBVTT"
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.contains("-->")
        {
            continue;
        }
        // Inline cue tags like <00:00:01.500><c> word</c>.
        let mut cleaned = String::with_capacity(line.len());
        let mut in_tag = false;
        for ch in line.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => cleaned.push(c),
                _ => {}
            }
        }
        let cleaned = cleaned.trim().to_string();
        if cleaned.is_empty() {
            continue;
        }
        if lines.last().map(|l| l == &cleaned).unwrap_or(false) {
            continue;
        }
        lines.push(cleaned);
    }
    lines.join("\n")
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn probe(&self, url: &str) -> Result<VideoInfo, ImportError> {
        tracing::debug!(url, "probing video metadata");
        let stdout = self
            .run(
                &self.ytdlp_bin,
                "yt-dlp",
                &["--dump-json", "--skip-download", "--no-warnings", url],
            )
            .await?;
        let json: Value = serde_json::from_slice(&stdout).map_err(|e| ImportError::Tool {
            tool: "yt-dlp",
            message: format!("unparseable metadata: {}", e),
        })?;
        Ok(info_from_json(&json))
    }

    async fn download_video(&self, url: &str, out_dir: &Path) -> Result<PathBuf, ImportError> {
        tokio::fs::create_dir_all(out_dir).await?;
        // yt-dlp picks the container, so the real extension is only
        // known after the run; find the file by its uuid stem.
        let stem = Uuid::new_v4().to_string();
        let template = out_dir.join(format!("{}.%(ext)s", stem));
        let template_str = template.to_string_lossy().into_owned();

        tracing::debug!(url, dir = %out_dir.display(), "downloading video");
        self.run(
            &self.ytdlp_bin,
            "yt-dlp",
            &[
                "-f",
                "bv*+ba/best",
                "--no-playlist",
                "--restrict-filenames",
                "--no-warnings",
                "-o",
                &template_str,
                url,
            ],
        )
        .await?;

        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(stem.as_str())
            {
                return Ok(entry.path());
            }
        }
        Err(ImportError::Tool {
            tool: "yt-dlp",
            message: "download reported success but no file was produced".to_string(),
        })
    }

    async fn download_audio(&self, url: &str, out_dir: &Path) -> Result<PathBuf, ImportError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let out = out_dir.join(format!("{}.mp3", Uuid::new_v4()));
        let out_str = out.to_string_lossy().into_owned();

        tracing::debug!(url, path = %out.display(), "downloading audio");
        self.run(
            &self.ytdlp_bin,
            "yt-dlp",
            &[
                "-x",
                "--audio-format",
                "mp3",
                "--no-warnings",
                "-o",
                &out_str,
                url,
            ],
        )
        .await?;

        Ok(out)
    }

    async fn extract_audio(&self, video: &Path) -> Result<PathBuf, ImportError> {
        let out = video.with_file_name(format!("{}.mp3", Uuid::new_v4()));
        let video_str = video.to_string_lossy().into_owned();
        let out_str = out.to_string_lossy().into_owned();

        self.run(
            &self.ffmpeg_bin,
            "ffmpeg",
            &[
                "-y", "-i", &video_str, "-vn", "-acodec", "libmp3lame", "-ar", "16000", "-ac",
                "1", &out_str,
            ],
        )
        .await?;

        Ok(out)
    }

    async fn capture_thumbnail(&self, video: &Path) -> Result<PathBuf, ImportError> {
        let out = video.with_file_name(format!("{}.jpg", Uuid::new_v4()));
        let video_str = video.to_string_lossy().into_owned();
        let out_str = out.to_string_lossy().into_owned();

        self.run(
            &self.ffmpeg_bin,
            "ffmpeg",
            &[
                "-y",
                "-i",
                &video_str,
                "-ss",
                "00:00:01.000",
                "-vframes",
                "1",
                &out_str,
            ],
        )
        .await?;

        Ok(out)
    }

    async fn cut_audio_chunk(
        &self,
        audio: &Path,
        start_secs: u64,
        duration_secs: u64,
    ) -> Result<PathBuf, ImportError> {
        let out = audio.with_file_name(format!(
            "{}-{}s.mp3",
            Uuid::new_v4(),
            start_secs
        ));
        let start = start_secs.to_string();
        let duration = duration_secs.to_string();
        let audio_str = audio.to_string_lossy().into_owned();
        let out_str = out.to_string_lossy().into_owned();

        self.run(
            &self.ffmpeg_bin,
            "ffmpeg",
            &[
                "-y", "-ss", &start, "-t", &duration, "-i", &audio_str, "-acodec", "copy",
                &out_str,
            ],
        )
        .await?;

        Ok(out)
    }
}

/// Fake downloader serving canned metadata and media paths.
#[derive(Debug, Default)]
pub struct FakeDownloader {
    infos: HashMap<String, VideoInfo>,
    video_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, url: &str, info: VideoInfo) -> Self {
        self.infos.insert(url.to_string(), info);
        self
    }

    pub fn with_video(mut self, path: PathBuf) -> Self {
        self.video_path = Some(path);
        self
    }

    pub fn with_audio(mut self, path: PathBuf) -> Self {
        self.audio_path = Some(path);
        self
    }
}

#[async_trait]
impl VideoDownloader for FakeDownloader {
    async fn probe(&self, url: &str) -> Result<VideoInfo, ImportError> {
        self.infos.get(url).cloned().ok_or_else(|| ImportError::Tool {
            tool: "yt-dlp",
            message: format!("No fake metadata for URL: {}", url),
        })
    }

    async fn download_video(&self, _url: &str, _out_dir: &Path) -> Result<PathBuf, ImportError> {
        self.video_path.clone().ok_or_else(|| ImportError::Tool {
            tool: "yt-dlp",
            message: "No fake video configured".to_string(),
        })
    }

    async fn download_audio(&self, _url: &str, _out_dir: &Path) -> Result<PathBuf, ImportError> {
        self.audio_path.clone().ok_or_else(|| ImportError::Tool {
            tool: "yt-dlp",
            message: "No fake audio configured".to_string(),
        })
    }

    async fn extract_audio(&self, video: &Path) -> Result<PathBuf, ImportError> {
        Ok(self
            .audio_path
            .clone()
            .unwrap_or_else(|| video.with_extension("mp3")))
    }

    async fn capture_thumbnail(&self, video: &Path) -> Result<PathBuf, ImportError> {
        Ok(video.with_extension("jpg"))
    }

    async fn cut_audio_chunk(
        &self,
        audio: &Path,
        _start_secs: u64,
        _duration_secs: u64,
    ) -> Result<PathBuf, ImportError> {
        Ok(audio.to_path_buf())
    }
}
