use crate::error::AppError;
use regex::Regex;
use std::time::Duration;
use tracing::info;

/// Extensions accepted as directly playable without scraping.
const DIRECT_EXTENSIONS: &[&str] = &["m3u8", "mp4", "mov", "avi"];

const STREAM_URL_PATTERN: &str = r#"https?://[^\s"'<>]+\.m3u8[^\s"'<>]*"#;

/// A URL (or local path) whose extension is already a known video or
/// playlist format is used as-is.
pub fn is_direct_source(url: &str) -> bool {
    let path = url
        .split_once('#')
        .map(|(p, _)| p)
        .unwrap_or(url)
        .split_once('?')
        .map(|(p, _)| p)
        .unwrap_or(url);
    path.rsplit_once('.')
        .map(|(_, ext)| DIRECT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// First `.m3u8` URL embedded in an HTML body, if any.
pub fn find_stream_url(body: &str) -> Option<String> {
    let pattern = Regex::new(STREAM_URL_PATTERN).ok()?;
    pattern.find(body).map(|m| m.as_str().to_string())
}

/// Resolve a user-supplied URL to something a video reader can open.
///
/// Direct video/playlist URLs pass through unchanged; anything else is
/// fetched once with a fixed timeout and scraped for the first embedded
/// `.m3u8` link. No retry and no validation that the stream is playable.
pub async fn resolve_source(url: &str, timeout: Duration) -> Result<String, AppError> {
    if is_direct_source(url) {
        return Ok(url.to_string());
    }

    info!("Scraping {} for an embedded stream URL", url);
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let body = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError {
            message: format!("Failed to fetch {}: {}", url, e),
        })?
        .error_for_status()
        .map_err(|e| AppError {
            message: format!("Failed to fetch {}: {}", url, e),
        })?
        .text()
        .await?;

    find_stream_url(&body).ok_or_else(|| AppError {
        message: format!("No .m3u8 stream found at {}", url),
    })
}
