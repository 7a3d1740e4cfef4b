use crate::error::{AppError, AppResult};
use crate::models::NewVideo;
use crate::utils::{parse_iso8601, ChannelRef};
use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDetails {
    pub external_id: String,
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub custom_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
    pub video: NewVideo,
    pub channel_external_id: String,
    pub channel_name: String,
}

/// One walk over a channel's uploads. Items that could not be read land in `errors`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadListing {
    pub videos: Vec<NewVideo>,
    pub errors: Vec<String>,
}

/// Read access to the video platform's metadata.
#[rocket::async_trait]
pub trait VideoPlatform: Send + Sync {
    async fn resolve_channel_id(&self, reference: &ChannelRef) -> AppResult<String>;

    async fn channel_details(&self, channel_id: &str) -> AppResult<ChannelDetails>;

    /// Newest-first uploads of a channel, at most `max_results`, stopping at the first
    /// item published before `published_after`.
    async fn recent_uploads(
        &self,
        channel_id: &str,
        max_results: usize,
        published_after: Option<DateTime<Utc>>,
    ) -> AppResult<UploadListing>;

    async fn video_details(&self, video_id: &str) -> AppResult<VideoDetails>;
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: &str, timeout: Duration) -> AppResult<Self> {
        Self::with_base_url(api_key, API_BASE, timeout)
    }

    /// Client against another Data API root, such as a local stand-in.
    pub fn with_base_url(api_key: &str, base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::PlatformApi(format!("failed to build HTTP client: {e}")))?;
        Ok(YouTubeClient {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, resource: &str, params: &[(&str, &str)]) -> AppResult<Value> {
        let url = format!("{}/{resource}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::PlatformApi(format!("{resource} request timed out"))
                } else {
                    AppError::PlatformApi(format!("{resource} request failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::PlatformApi(format!("malformed {resource} response: {e}")))?;

        if !status.is_success() {
            return Err(api_error(resource, status, &body));
        }
        Ok(body)
    }

    async fn uploads_playlist_id(&self, channel_id: &str) -> AppResult<String> {
        let response = self
            .get_json("channels", &[("part", "contentDetails"), ("id", channel_id)])
            .await?;

        response["items"][0]["contentDetails"]["relatedPlaylists"]["uploads"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AppError::NotFound(format!("Channel {channel_id} not found")))
    }

    async fn first_search_hit(&self, query: &str) -> AppResult<Option<String>> {
        let response = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "channel"),
                    ("maxResults", "1"),
                ],
            )
            .await?;
        Ok(response["items"][0]["snippet"]["channelId"]
            .as_str()
            .map(String::from))
    }
}

fn api_error(resource: &str, status: StatusCode, body: &Value) -> AppError {
    let reason = body["error"]["errors"][0]["reason"].as_str().unwrap_or("");
    let message = body["error"]["message"].as_str().unwrap_or("no message");
    if status == StatusCode::FORBIDDEN && reason == "quotaExceeded" {
        AppError::PlatformApi("YouTube API quota exceeded".to_string())
    } else {
        AppError::PlatformApi(format!("{resource} returned {status}: {message}"))
    }
}

fn best_thumbnail(thumbnails: &Value) -> Option<String> {
    ["high", "medium", "default"]
        .iter()
        .find_map(|size| thumbnails[*size]["url"].as_str())
        .map(String::from)
}

pub fn parse_channel_details(channel_id: &str, response: &Value) -> AppResult<ChannelDetails> {
    let snippet = &response["items"][0]["snippet"];
    let name = snippet["title"]
        .as_str()
        .ok_or_else(|| AppError::NotFound(format!("Channel {channel_id} not found")))?;

    Ok(ChannelDetails {
        external_id: channel_id.to_string(),
        name: name.to_string(),
        thumbnail_url: best_thumbnail(&snippet["thumbnails"]),
        custom_url: snippet["customUrl"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from),
    })
}

/// Outcome of reading one `playlistItems` page.
#[derive(Debug, Default, PartialEq)]
pub struct PlaylistPage {
    pub videos: Vec<NewVideo>,
    pub errors: Vec<String>,
    /// An item older than the cut-off was seen; later pages are older still.
    pub reached_cutoff: bool,
    pub next_page_token: Option<String>,
}

pub fn parse_playlist_page(
    response: &Value,
    remaining: usize,
    published_after: Option<DateTime<Utc>>,
) -> PlaylistPage {
    let mut page = PlaylistPage {
        next_page_token: response["nextPageToken"].as_str().map(String::from),
        ..Default::default()
    };

    for item in response["items"].as_array().into_iter().flatten() {
        if page.videos.len() >= remaining {
            break;
        }

        let snippet = &item["snippet"];
        let Some(video_id) = item["contentDetails"]["videoId"]
            .as_str()
            .or_else(|| snippet["resourceId"]["videoId"].as_str())
        else {
            page.errors.push("playlist item without a video id".to_string());
            continue;
        };

        let published_raw = item["contentDetails"]["videoPublishedAt"]
            .as_str()
            .or_else(|| snippet["publishedAt"].as_str())
            .unwrap_or("");
        let Some(published_at) = parse_iso8601(published_raw) else {
            page.errors.push(format!(
                "video {video_id}: unparsable publish date '{published_raw}'"
            ));
            continue;
        };

        if published_after.is_some_and(|cutoff| published_at < cutoff) {
            page.reached_cutoff = true;
            break;
        }

        page.videos.push(NewVideo {
            external_id: video_id.to_string(),
            title: snippet["title"].as_str().unwrap_or("Untitled").to_string(),
            thumbnail_url: best_thumbnail(&snippet["thumbnails"]),
            published_at: Some(published_at),
        });
    }

    page
}

pub fn parse_video_details(video_id: &str, response: &Value) -> AppResult<VideoDetails> {
    let snippet = &response["items"][0]["snippet"];
    let (Some(title), Some(channel_id)) = (snippet["title"].as_str(), snippet["channelId"].as_str())
    else {
        return Err(AppError::NotFound(format!("Video {video_id} not found")));
    };

    Ok(VideoDetails {
        video: NewVideo {
            external_id: video_id.to_string(),
            title: title.to_string(),
            thumbnail_url: best_thumbnail(&snippet["thumbnails"]),
            published_at: snippet["publishedAt"].as_str().and_then(parse_iso8601),
        },
        channel_external_id: channel_id.to_string(),
        channel_name: snippet["channelTitle"].as_str().unwrap_or("").to_string(),
    })
}

#[rocket::async_trait]
impl VideoPlatform for YouTubeClient {
    async fn resolve_channel_id(&self, reference: &ChannelRef) -> AppResult<String> {
        let resolved = match reference {
            ChannelRef::Id(id) => return Ok(id.clone()),
            ChannelRef::Handle(handle) => {
                let handle = format!("@{handle}");
                let response = self
                    .get_json("channels", &[("part", "id"), ("forHandle", handle.as_str())])
                    .await?;
                response["items"][0]["id"].as_str().map(String::from)
            }
            ChannelRef::User(username) => {
                let response = self
                    .get_json("channels", &[("part", "id"), ("forUsername", username.as_str())])
                    .await?;
                response["items"][0]["id"].as_str().map(String::from)
            }
            // Custom URLs have no lookup endpoint; the search API is the only way in.
            ChannelRef::Custom(name) => self.first_search_hit(name).await?,
        };

        resolved.ok_or_else(|| {
            warn!("Could not resolve channel reference {reference:?}");
            AppError::NotFound(
                "Channel not found. Please verify the URL and try again.".to_string(),
            )
        })
    }

    async fn channel_details(&self, channel_id: &str) -> AppResult<ChannelDetails> {
        let response = self
            .get_json("channels", &[("part", "snippet"), ("id", channel_id)])
            .await?;
        parse_channel_details(channel_id, &response)
    }

    async fn recent_uploads(
        &self,
        channel_id: &str,
        max_results: usize,
        published_after: Option<DateTime<Utc>>,
    ) -> AppResult<UploadListing> {
        let playlist_id = self.uploads_playlist_id(channel_id).await?;
        let mut listing = UploadListing::default();
        let mut next_page_token: Option<String> = None;

        while listing.videos.len() < max_results {
            let remaining = max_results - listing.videos.len();
            let page_size = remaining.min(MAX_PAGE_SIZE).to_string();
            let mut params = vec![
                ("part", "snippet,contentDetails"),
                ("playlistId", playlist_id.as_str()),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = next_page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self.get_json("playlistItems", &params).await?;
            let page = parse_playlist_page(&response, remaining, published_after);

            listing.videos.extend(page.videos);
            listing.errors.extend(page.errors);

            if page.reached_cutoff {
                info!("Reached uploads older than the look-back window, stopping fetch");
                break;
            }
            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        info!(
            "Fetched {} videos from channel {channel_id}",
            listing.videos.len()
        );
        Ok(listing)
    }

    async fn video_details(&self, video_id: &str) -> AppResult<VideoDetails> {
        let response = self
            .get_json("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;
        parse_video_details(video_id, &response)
    }
}
