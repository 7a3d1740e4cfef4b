use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a video's caption/summary pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 4] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(format!("unknown processing status '{other}'")),
        }
    }
}

impl ToSql for ProcessingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProcessingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub video_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: i64,
    pub channel_id: i64,
    pub channel_name: Option<String>,
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub caption_text: Option<String>,
    pub caption_language: Option<String>,
    pub short_summary: Option<String>,
    pub detailed_summary: Option<String>,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List view of a video: no caption text and no detailed summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoListItem {
    pub id: i64,
    pub channel_id: i64,
    pub channel_name: Option<String>,
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub short_summary: Option<String>,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Video> for VideoListItem {
    fn from(video: Video) -> Self {
        VideoListItem {
            id: video.id,
            channel_id: video.channel_id,
            channel_name: video.channel_name,
            external_id: video.external_id,
            title: video.title,
            thumbnail_url: video.thumbnail_url,
            published_at: video.published_at,
            short_summary: video.short_summary,
            processing_status: video.processing_status,
            error_message: video.error_message,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

/// A video as reported by the platform, before it enters the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideo {
    pub external_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChannel {
    pub external_id: String,
    pub name: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSort {
    Published,
    Status,
    Created,
}

#[derive(Debug, Clone)]
pub struct VideoQuery {
    pub page: i64,
    pub per_page: i64,
    pub channel_id: Option<i64>,
    pub status: Option<ProcessingStatus>,
    pub sort: VideoSort,
    pub order: SortOrder,
}

impl Default for VideoQuery {
    fn default() -> Self {
        VideoQuery {
            page: 1,
            per_page: 20,
            channel_id: None,
            status: None,
            sort: VideoSort::Published,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStats {
    pub channels: i64,
    pub videos: ProcessingStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSyncError {
    pub channel_id: i64,
    pub channel_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub channel_id: i64,
    pub channel_name: String,
    pub fetched: usize,
    pub new_videos: usize,
    pub skipped_videos: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncAllReport {
    pub total_channels: usize,
    pub successful_channels: usize,
    pub failed_channels: usize,
    pub total_new_videos: usize,
    pub total_skipped_videos: usize,
    pub errors: Vec<ChannelSyncError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemError {
    pub video_id: i64,
    pub external_id: String,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub limit: usize,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<BatchItemError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdhocResult {
    pub external_id: String,
    pub caption_language: String,
    pub caption_text: String,
    pub short_summary: String,
    pub detailed_summary: String,
    pub saved: bool,
    pub video: Option<Video>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupReport {
    pub days: i64,
    pub deleted: usize,
}

// Request bodies

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddChannelRequest {
    pub channel_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoUrlRequest {
    pub video_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessUrlRequest {
    pub video_url: String,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptionsResponse {
    pub external_id: String,
    pub language: String,
    pub captions: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub caption_text: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub short_summary: String,
    pub detailed_summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
