//! YouTube link parsing for match highlights and gallery videos.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use url::Url;

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern is valid"));

const THUMBNAIL_BASE: &str = "https://img.youtube.com/vi";
const EMBED_BASE: &str = "https://www.youtube.com/embed";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum YoutubeUrlError {
    #[error("not a valid url: {0}")]
    InvalidUrl(String),
    #[error("not a youtube host: {0}")]
    UnsupportedHost(String),
    #[error("no video id in url")]
    MissingVideoId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailQuality {
    Default,
    Medium,
    #[default]
    High,
    Standard,
    MaxRes,
}

impl ThumbnailQuality {
    fn file_stem(self) -> &'static str {
        match self {
            ThumbnailQuality::Default => "default",
            ThumbnailQuality::Medium => "mqdefault",
            ThumbnailQuality::High => "hqdefault",
            ThumbnailQuality::Standard => "sddefault",
            ThumbnailQuality::MaxRes => "maxresdefault",
        }
    }
}

/// A validated 11 character YouTube video id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(candidate: &str) -> Option<Self> {
        VIDEO_ID
            .is_match(candidate)
            .then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn thumbnail_url(&self, quality: ThumbnailQuality) -> String {
        format!("{}/{}/{}.jpg", THUMBNAIL_BASE, self.0, quality.file_stem())
    }

    pub fn embed_url(&self) -> String {
        format!("{}/{}", EMBED_BASE, self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the video id from any of the usual YouTube link shapes
pub fn extract_video_id(input: &str) -> Result<VideoId, YoutubeUrlError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{}", trimmed)))
        .map_err(|_| YoutubeUrlError::InvalidUrl(trimmed.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| YoutubeUrlError::InvalidUrl(trimmed.to_string()))?;
    let host = host
        .trim_start_matches("www.")
        .trim_start_matches("m.")
        .trim_start_matches("music.");

    let mut segments = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed" | "v" | "shorts" | "live") => segments.next().map(str::to_string),
            _ => None,
        },
        "youtube-nocookie.com" => match segments.next() {
            Some("embed") => segments.next().map(str::to_string),
            _ => None,
        },
        other => return Err(YoutubeUrlError::UnsupportedHost(other.to_string())),
    };

    candidate
        .as_deref()
        .and_then(VideoId::parse)
        .ok_or(YoutubeUrlError::MissingVideoId)
}

/// Video id plus the derived URLs the frontend needs
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct YoutubeVideo {
    pub video_id: VideoId,
    pub thumbnail_url: String,
    pub embed_url: String,
}

impl YoutubeVideo {
    pub fn from_url(input: &str, quality: ThumbnailQuality) -> Result<Self, YoutubeUrlError> {
        let video_id = extract_video_id(input)?;
        Ok(Self {
            thumbnail_url: video_id.thumbnail_url(quality),
            embed_url: video_id.embed_url(),
            video_id,
        })
    }
}
