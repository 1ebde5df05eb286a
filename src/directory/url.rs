// SPDX-License-Identifier: GPL-3.0-only

//! External stream URL classification

use crate::constants::directory::YOUTUBE_EMBED_PREFIX;
use crate::errors::DirectoryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitch,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Youtube => write!(f, "youtube"),
            Platform::Twitch => write!(f, "twitch"),
        }
    }
}

/// A recognised stream URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStreamUrl {
    pub platform: Platform,
    /// Video id, channel id, custom name or handle (YouTube); login name (Twitch)
    pub channel: String,
    pub embed_url: String,
}

/// Patterns in match order; YouTube forms first
static PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    [
        (Platform::Youtube, r"(?:youtube\.com/watch\?v=|youtu\.be/)([\w-]+)"),
        (Platform::Youtube, r"youtube\.com/channel/([\w-]+)"),
        (Platform::Youtube, r"youtube\.com/c/([\w-]+)"),
        (Platform::Youtube, r"youtube\.com/@([\w-]+)"),
        (Platform::Twitch, r"twitch\.tv/([\w-]+)"),
    ]
    .into_iter()
    .filter_map(|(platform, pattern)| Regex::new(pattern).ok().map(|re| (platform, re)))
    .collect()
});

/// Classify a YouTube or Twitch URL and derive its embed URL
pub fn parse_stream_url(url: &str) -> Result<ParsedStreamUrl, DirectoryError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DirectoryError::MissingField("url"));
    }

    for (platform, re) in PATTERNS.iter() {
        let Some(channel) = re.captures(url).and_then(|c| c.get(1)) else {
            continue;
        };
        let channel = channel.as_str().to_string();
        let embed_url = match platform {
            Platform::Youtube => format!("{}{}", YOUTUBE_EMBED_PREFIX, channel),
            Platform::Twitch => url.to_string(),
        };
        return Ok(ParsedStreamUrl {
            platform: *platform,
            channel,
            embed_url,
        });
    }

    Err(DirectoryError::UnsupportedUrl(url.to_string()))
}
