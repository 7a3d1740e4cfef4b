use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

pub const MAX_VIDEOS_PER_REQUEST: i64 = 50;
pub const DEFAULT_VIDEOS_PER_REQUEST: i64 = 10;
pub const MAX_VIDEOS_BATCH_PROCESS: i64 = 20;
pub const DEFAULT_VIDEOS_BATCH_PROCESS: i64 = 10;
pub const DEFAULT_FAILED_REPROCESS: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 50;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Highest page whose row offset still fits in an i64.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;
pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_TEXT_LENGTH: usize = 1_000_000;

lazy_static! {
    static ref VIDEO_ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    static ref CHANNEL_ID_PATTERN: Regex = Regex::new(r"^UC[A-Za-z0-9_-]{22}$").unwrap();
    static ref CHANNEL_SEGMENT_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
}

/// How a channel URL names its channel. Only `Id` can be used without a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
    Custom(String),
    User(String),
}

/// Parse ISO8601 date string (as returned by the YouTube API) into a UTC timestamp
pub fn parse_iso8601(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_http_url(url: &str) -> AppResult<Url> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("URL is required".to_string()));
    }
    if url.len() > MAX_URL_LENGTH {
        return Err(AppError::Validation("URL is too long".to_string()));
    }

    let parsed = Url::parse(url)
        .map_err(|e| AppError::Validation(format!("URL parsing error: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(AppError::Validation(
            "Invalid URL scheme (must be http or https)".to_string(),
        )),
    }
}

pub fn validate_video_id(video_id: &str) -> AppResult<String> {
    let video_id = video_id.trim();
    if VIDEO_ID_PATTERN.is_match(video_id) {
        Ok(video_id.to_string())
    } else {
        Err(AppError::Validation(
            "Invalid video ID format (must be 11 characters: a-zA-Z0-9_-)".to_string(),
        ))
    }
}

pub fn is_channel_id(channel_id: &str) -> bool {
    CHANNEL_ID_PATTERN.is_match(channel_id)
}

/// Extract the video id from `youtube.com/watch?v=`, `youtu.be/`, `/embed/` and `/shorts/` URLs.
pub fn extract_youtube_video_id(url: &str) -> AppResult<String> {
    let parsed = parse_http_url(url)?;
    let host = parsed.host_str().unwrap_or_default();

    let candidate = match host {
        "www.youtube.com" | "youtube.com" | "m.youtube.com" => {
            let mut segments = parsed.path_segments().into_iter().flatten();
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string()),
                Some("embed") | Some("shorts") | Some("live") => {
                    segments.next().map(str::to_string)
                }
                _ => None,
            }
        }
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        _ => return Err(AppError::Validation("Not a valid YouTube URL".to_string())),
    };

    match candidate {
        Some(id) if !id.is_empty() => validate_video_id(&id),
        _ => Err(AppError::Validation(
            "Invalid or missing video ID in URL".to_string(),
        )),
    }
}

/// Parse a channel URL of the `/channel/`, `/@`, `/c/` or `/user/` forms.
pub fn parse_channel_url(url: &str) -> AppResult<ChannelRef> {
    let parsed = parse_http_url(url)?;
    let host = parsed.host_str().unwrap_or_default();
    if !matches!(host, "www.youtube.com" | "youtube.com" | "m.youtube.com") {
        return Err(AppError::Validation(
            "Not a valid YouTube channel URL".to_string(),
        ));
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let invalid_format = || {
        AppError::Validation(
            "Invalid channel URL format (expected /channel/, /c/, /@, or /user/)".to_string(),
        )
    };

    let reference = match segments.as_slice() {
        [handle, ..] if handle.starts_with('@') && handle.len() > 1 => {
            ChannelRef::Handle(handle[1..].to_string())
        }
        ["channel", id, ..] => {
            if !is_channel_id(id) {
                return Err(AppError::Validation(
                    "Invalid channel ID format (must start with UC and be 24 characters total)"
                        .to_string(),
                ));
            }
            ChannelRef::Id(id.to_string())
        }
        ["c", name, ..] => ChannelRef::Custom(name.to_string()),
        ["user", name, ..] => ChannelRef::User(name.to_string()),
        _ => return Err(invalid_format()),
    };

    let name = match &reference {
        ChannelRef::Id(v) | ChannelRef::Handle(v) | ChannelRef::Custom(v) | ChannelRef::User(v) => v,
    };
    if !CHANNEL_SEGMENT_PATTERN.is_match(name) {
        return Err(invalid_format());
    }

    Ok(reference)
}

/// Pagination is sanitised rather than rejected: page is clamped into `1..=MAX_PAGE`, per_page into `1..=MAX_PAGE_SIZE`.
pub fn sanitize_pagination(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1).min(MAX_PAGE);
    let per_page = match per_page {
        Some(n) if n < 1 => DEFAULT_PAGE_SIZE,
        Some(n) => n.min(MAX_PAGE_SIZE),
        None => DEFAULT_PAGE_SIZE,
    };
    (page, per_page)
}

/// Clamp a requested item count into `1..=max`, substituting `default` for missing or non-positive values.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> usize {
    let value = match requested {
        Some(n) if n >= 1 => n.min(max),
        _ => default,
    };
    value as usize
}

pub fn sanitize_text(text: &str) -> String {
    let truncated: String = text.chars().take(MAX_TEXT_LENGTH).collect();
    truncated.trim().to_string()
}

/// Join transcript fragments into one line of text.
pub fn normalize_caption_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    fragments
        .into_iter()
        .map(|fragment| fragment.replace(['\r', '\n'], " "))
        .map(|fragment| fragment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn language_name(code: &str) -> &str {
    match code.split(['-', '_']).next().unwrap_or(code) {
        "pl" => "Polish",
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        _ => code,
    }
}
