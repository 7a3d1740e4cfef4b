use crate::db::Database;
use crate::error::AppResult;
use crate::models::{ChannelSyncError, SyncAllReport, SyncReport};
use crate::services::channel_service;
use crate::services::video_service;
use crate::services::youtube::VideoPlatform;
use crate::utils::{clamp_limit, DEFAULT_VIDEOS_PER_REQUEST, MAX_VIDEOS_PER_REQUEST};
use chrono::{Duration, Utc};
use log::{error, info, warn};

/// Pull a channel's recent uploads into the catalog. Known videos are skipped.
pub async fn sync_channel(
    db: &Database,
    platform: &dyn VideoPlatform,
    channel_id: i64,
    max_videos: Option<i64>,
    lookback_days: Option<i64>,
) -> AppResult<SyncReport> {
    let channel = channel_service::get_channel(db, channel_id).await?;
    let limit = clamp_limit(max_videos, DEFAULT_VIDEOS_PER_REQUEST, MAX_VIDEOS_PER_REQUEST);
    let published_after = lookback_days.map(|days| Utc::now() - Duration::days(days));

    info!(
        "Syncing channel '{}' ({}), up to {limit} videos",
        channel.name, channel.external_id
    );
    let listing = platform
        .recent_uploads(&channel.external_id, limit, published_after)
        .await?;

    let mut report = SyncReport {
        channel_id: channel.id,
        channel_name: channel.name.clone(),
        fetched: listing.videos.len(),
        new_videos: 0,
        skipped_videos: 0,
        errors: listing.errors,
    };

    for video in &listing.videos {
        match video_service::insert_if_absent(db, channel.id, video).await {
            Ok(true) => report.new_videos += 1,
            Ok(false) => report.skipped_videos += 1,
            Err(e) => {
                error!("Failed to store video {}: {e}", video.external_id);
                report
                    .errors
                    .push(format!("Error processing video {}: {e}", video.external_id));
            }
        }
    }

    info!(
        "Sync of '{}' done: {} new, {} skipped, {} errors",
        channel.name,
        report.new_videos,
        report.skipped_videos,
        report.errors.len()
    );
    Ok(report)
}

/// Sync every registered channel. A failing channel does not stop the others.
pub async fn sync_all_channels(
    db: &Database,
    platform: &dyn VideoPlatform,
    max_videos: Option<i64>,
    lookback_days: Option<i64>,
) -> AppResult<SyncAllReport> {
    let channels = channel_service::list_channels(db).await?;
    let mut report = SyncAllReport {
        total_channels: channels.len(),
        successful_channels: 0,
        failed_channels: 0,
        total_new_videos: 0,
        total_skipped_videos: 0,
        errors: Vec::new(),
    };

    for channel in channels {
        match sync_channel(db, platform, channel.id, max_videos, lookback_days).await {
            Ok(sync) => {
                report.successful_channels += 1;
                report.total_new_videos += sync.new_videos;
                report.total_skipped_videos += sync.skipped_videos;
            }
            Err(e) => {
                warn!("Sync of channel '{}' failed: {e}", channel.name);
                report.failed_channels += 1;
                report.errors.push(ChannelSyncError {
                    channel_id: channel.id,
                    channel_name: channel.name,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Synced {}/{} channels, {} new videos",
        report.successful_channels, report.total_channels, report.total_new_videos
    );
    Ok(report)
}
