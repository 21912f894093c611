//! Headless-browser rendering seam.
//!
//! Some platforms only expose captions and markup to a real browser.
//! Rendering is synchronous; callers on an async runtime should go
//! through `spawn_blocking`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::Browser;

use crate::error::ImportError;

/// Trait for rendering a page in a real browser.
pub trait PageRenderer: Send + Sync {
    /// Navigate to a URL and return the DOM serialized as HTML after
    /// scripts have run.
    fn render_html(&self, url: &str) -> Result<String, ImportError>;

    /// Navigate to a URL and capture a PNG screenshot.
    fn screenshot(&self, url: &str) -> Result<Vec<u8>, ImportError>;
}

/// Find a Chrome/Chromium executable, checking the Playwright cache first.
fn find_chrome() -> Option<PathBuf> {
    if let Ok(chrome_path) = std::env::var("CHROME") {
        let path = PathBuf::from(&chrome_path);
        if path.exists() {
            tracing::debug!(path = %path.display(), "Using Chrome from CHROME env var");
            return Some(path);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let playwright_cache = PathBuf::from(&home).join(".cache/ms-playwright");
        if let Ok(entries) = std::fs::read_dir(&playwright_cache) {
            let mut chrome_dirs: Vec<_> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("chromium-"))
                .collect();
            chrome_dirs.sort_by_key(|b| std::cmp::Reverse(b.file_name()));

            for dir in chrome_dirs {
                for subpath in &["chrome-linux64/chrome", "chrome-linux/chrome"] {
                    let chrome_path = dir.path().join(subpath);
                    if chrome_path.exists() {
                        tracing::debug!(path = %chrome_path.display(), "Found Chrome in Playwright cache");
                        return Some(chrome_path);
                    }
                }
            }
        }
    }

    None
}

/// Renderer backed by headless Chrome.
pub struct ChromeRenderer;

impl ChromeRenderer {
    pub fn new() -> Self {
        Self
    }

    fn open_tab(&self, url: &str) -> Result<(Browser, Arc<headless_chrome::Tab>), ImportError> {
        let mut builder = headless_chrome::LaunchOptions::default_builder();
        builder
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--ignore-certificate-errors"),
            ])
            .path(find_chrome());

        let options = builder.build().map_err(|e| ImportError::Tool {
            tool: "chrome",
            message: e.to_string(),
        })?;
        let browser = Browser::new(options).map_err(|e| ImportError::Tool {
            tool: "chrome",
            message: e.to_string(),
        })?;

        let tab = browser.new_tab().map_err(|e| ImportError::Tool {
            tool: "chrome",
            message: e.to_string(),
        })?;

        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| ImportError::Tool {
                tool: "chrome",
                message: e.to_string(),
            })?;

        // Give client-side rendering a moment to settle.
        std::thread::sleep(std::time::Duration::from_millis(1500));

        Ok((browser, tab))
    }
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for ChromeRenderer {
    fn render_html(&self, url: &str) -> Result<String, ImportError> {
        let (_browser, tab) = self.open_tab(url)?;
        tab.get_content().map_err(|e| ImportError::Tool {
            tool: "chrome",
            message: e.to_string(),
        })
    }

    fn screenshot(&self, url: &str) -> Result<Vec<u8>, ImportError> {
        let (_browser, tab) = self.open_tab(url)?;
        tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| ImportError::Tool {
                tool: "chrome",
                message: e.to_string(),
            })
    }
}

/// Fake renderer serving canned HTML per URL.
#[derive(Default)]
pub struct FakeRenderer {
    pages: HashMap<String, String>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

impl PageRenderer for FakeRenderer {
    fn render_html(&self, url: &str) -> Result<String, ImportError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ImportError::Tool {
                tool: "chrome",
                message: format!("No fake page for URL: {}", url),
            })
    }

    fn screenshot(&self, url: &str) -> Result<Vec<u8>, ImportError> {
        self.render_html(url).map(|html| html.into_bytes())
    }
}
