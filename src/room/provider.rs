//! Video identity extraction
//!
//! Only YouTube URL shapes are recognised; everything else is rendered as
//! unsupported and never reaches a widget.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/.*v=|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .expect("static pattern is valid")
});

/// Opaque provider token (11 characters for YouTube)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical URL for widgets that load by URL
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the provider id from a video URL
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    if url.is_empty() {
        return None;
    }

    YOUTUBE_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
}
