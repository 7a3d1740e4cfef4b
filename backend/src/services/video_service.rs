use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    NewVideo, ProcessingStats, ProcessingStatus, SortOrder, Video, VideoListItem,
    VideoListResponse, VideoQuery, VideoSort,
};
use crate::utils::sanitize_pagination;
use chrono::{Duration, Utc};
use log::{info, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

const VIDEO_COLUMNS: &str = "
    v.id, v.channel_id, c.name AS channel_name, v.external_id, v.title, v.thumbnail_url,
    v.published_at, v.caption_text, v.caption_language, v.short_summary, v.detailed_summary,
    v.processing_status, v.error_message, v.created_at, v.updated_at";

const VIDEO_FROM: &str = "FROM videos v LEFT JOIN channels c ON c.id = v.channel_id";

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: row.get("id")?,
        channel_id: row.get("channel_id")?,
        channel_name: row.get("channel_name")?,
        external_id: row.get("external_id")?,
        title: row.get("title")?,
        thumbnail_url: row.get("thumbnail_url")?,
        published_at: row.get("published_at")?,
        caption_text: row.get("caption_text")?,
        caption_language: row.get("caption_language")?,
        short_summary: row.get("short_summary")?,
        detailed_summary: row.get("detailed_summary")?,
        processing_status: row.get("processing_status")?,
        error_message: row.get("error_message")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Insert a pending video unless its external id is already catalogued. Returns whether a row was added.
pub async fn insert_if_absent(db: &Database, channel_id: i64, video: &NewVideo) -> AppResult<bool> {
    let video = video.clone();
    let now = Utc::now();
    let inserted = db
        .with_connection(move |conn| {
            conn.execute(
                "INSERT INTO videos (channel_id, external_id, title, thumbnail_url, published_at,
                                     processing_status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(external_id) DO NOTHING",
                params![
                    channel_id,
                    video.external_id,
                    video.title,
                    video.thumbnail_url,
                    video.published_at,
                    ProcessingStatus::Pending,
                    now
                ],
            )
        })
        .await?;
    Ok(inserted > 0)
}

pub async fn find_video(db: &Database, id: i64) -> AppResult<Option<Video>> {
    db.with_connection(move |conn| {
        conn.query_row(
            &format!("SELECT {VIDEO_COLUMNS} {VIDEO_FROM} WHERE v.id = ?1"),
            [id],
            video_from_row,
        )
        .optional()
    })
    .await
}

pub async fn get_video(db: &Database, id: i64) -> AppResult<Video> {
    find_video(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {id} not found")))
}

pub async fn find_by_external_id(db: &Database, external_id: &str) -> AppResult<Option<Video>> {
    let external_id = external_id.to_string();
    db.with_connection(move |conn| {
        conn.query_row(
            &format!("SELECT {VIDEO_COLUMNS} {VIDEO_FROM} WHERE v.external_id = ?1"),
            [&external_id],
            video_from_row,
        )
        .optional()
    })
    .await
}

fn order_clause(sort: VideoSort, order: SortOrder) -> String {
    let dir = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    match sort {
        VideoSort::Published => {
            format!("v.published_at IS NULL, v.published_at {dir}, v.id {dir}")
        }
        VideoSort::Status => format!(
            "CASE v.processing_status
                 WHEN 'processing' THEN 0
                 WHEN 'pending' THEN 1
                 WHEN 'failed' THEN 2
                 ELSE 3
             END {dir}, v.published_at DESC, v.id DESC"
        ),
        VideoSort::Created => format!("v.created_at {dir}, v.id {dir}"),
    }
}

pub async fn list_videos(db: &Database, query: &VideoQuery) -> AppResult<VideoListResponse> {
    let (page, per_page) = sanitize_pagination(Some(query.page), Some(query.per_page));
    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::Validation(format!("page {page} is out of range")))?;

    let mut conditions = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(channel_id) = query.channel_id {
        values.push(SqlValue::Integer(channel_id));
        conditions.push(format!("v.channel_id = ?{}", values.len()));
    }
    if let Some(status) = query.status {
        values.push(SqlValue::Text(status.as_str().to_string()));
        conditions.push(format!("v.processing_status = ?{}", values.len()));
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) {VIDEO_FROM} {where_clause}");
    let count_values = values.clone();
    let total: i64 = db
        .with_connection(move |conn| {
            conn.query_row(&count_sql, params_from_iter(count_values.iter()), |row| {
                row.get(0)
            })
        })
        .await?;

    let mut page_values = values;
    page_values.push(SqlValue::Integer(per_page));
    page_values.push(SqlValue::Integer(offset));
    let sql = format!(
        "SELECT {VIDEO_COLUMNS} {VIDEO_FROM} {where_clause} ORDER BY {} LIMIT ?{} OFFSET ?{}",
        order_clause(query.sort, query.order),
        page_values.len() - 1,
        page_values.len()
    );

    let videos = db
        .with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(page_values.iter()), video_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;

    Ok(VideoListResponse {
        videos: videos.into_iter().map(VideoListItem::from).collect(),
        total,
        page,
        per_page,
        total_pages: (total + per_page - 1) / per_page,
    })
}

pub async fn delete_video(db: &Database, id: i64) -> AppResult<()> {
    let deleted = db
        .with_connection(move |conn| conn.execute("DELETE FROM videos WHERE id = ?1", [id]))
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Video {id} not found")));
    }
    info!("Deleted video #{id}");
    Ok(())
}

/// Explain why a conditional update touched no row.
async fn transition_error(db: &Database, id: i64, action: &str) -> AppError {
    match find_video(db, id).await {
        Ok(Some(video)) => AppError::Conflict(format!(
            "Cannot {action} video {id} while it is {}",
            video.processing_status
        )),
        Ok(None) => AppError::NotFound(format!("Video {id} not found")),
        Err(e) => e,
    }
}

/// Move a pending or failed video to processing. Only one caller can win this transition.
pub async fn begin_processing(db: &Database, id: i64) -> AppResult<Video> {
    let changed = db
        .with_connection(move |conn| {
            conn.execute(
                "UPDATE videos
                 SET processing_status = 'processing', short_summary = NULL, detailed_summary = NULL,
                     error_message = NULL, updated_at = ?2
                 WHERE id = ?1 AND processing_status IN ('pending', 'failed')",
                params![id, Utc::now()],
            )
        })
        .await?;
    if changed == 0 {
        return Err(transition_error(db, id, "start processing").await);
    }
    get_video(db, id).await
}

/// Store the pipeline output and complete the video in a single update.
pub async fn mark_completed(
    db: &Database,
    id: i64,
    caption_text: &str,
    caption_language: &str,
    short_summary: &str,
    detailed_summary: &str,
) -> AppResult<Video> {
    let fields = [
        caption_text.to_string(),
        caption_language.to_string(),
        short_summary.to_string(),
        detailed_summary.to_string(),
    ];
    let changed = db
        .with_connection(move |conn| {
            let [caption_text, caption_language, short_summary, detailed_summary] = &fields;
            conn.execute(
                "UPDATE videos
                 SET caption_text = ?2, caption_language = ?3, short_summary = ?4,
                     detailed_summary = ?5, processing_status = 'completed', error_message = NULL,
                     updated_at = ?6
                 WHERE id = ?1 AND processing_status = 'processing'",
                params![
                    id,
                    caption_text,
                    caption_language,
                    short_summary,
                    detailed_summary,
                    Utc::now()
                ],
            )
        })
        .await?;
    if changed == 0 {
        return Err(transition_error(db, id, "complete").await);
    }
    get_video(db, id).await
}

pub async fn mark_failed(db: &Database, id: i64, error_message: &str) -> AppResult<()> {
    let error_message = error_message.to_string();
    let changed = db
        .with_connection(move |conn| {
            conn.execute(
                "UPDATE videos
                 SET processing_status = 'failed', short_summary = NULL, detailed_summary = NULL,
                     error_message = ?2, updated_at = ?3
                 WHERE id = ?1 AND processing_status = 'processing'",
                params![id, error_message, Utc::now()],
            )
        })
        .await?;
    if changed == 0 {
        return Err(transition_error(db, id, "fail").await);
    }
    Ok(())
}

/// Manual recovery: a stuck or failed video goes back to pending.
pub async fn reset_video(db: &Database, id: i64) -> AppResult<Video> {
    let changed = db
        .with_connection(move |conn| {
            conn.execute(
                "UPDATE videos
                 SET processing_status = 'pending', error_message = NULL, updated_at = ?2
                 WHERE id = ?1 AND processing_status IN ('processing', 'failed')",
                params![id, Utc::now()],
            )
        })
        .await?;
    if changed == 0 {
        return Err(transition_error(db, id, "reset").await);
    }
    warn!("Video #{id} was manually reset to pending");
    get_video(db, id).await
}

/// Oldest-first selection of videos in `status`.
pub async fn select_by_status(
    db: &Database,
    status: ProcessingStatus,
    limit: usize,
) -> AppResult<Vec<Video>> {
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {VIDEO_COLUMNS} {VIDEO_FROM}
             WHERE v.processing_status = ?1
             ORDER BY v.created_at ASC, v.id ASC
             LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![status, limit as i64], video_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

pub async fn processing_stats(db: &Database) -> AppResult<ProcessingStats> {
    let counts = db
        .with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT processing_status, COUNT(*) FROM videos GROUP BY processing_status",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, ProcessingStatus>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;

    let mut stats = ProcessingStats {
        total: 0,
        pending: 0,
        processing: 0,
        completed: 0,
        failed: 0,
    };
    for (status, count) in counts {
        stats.total += count;
        match status {
            ProcessingStatus::Pending => stats.pending = count,
            ProcessingStatus::Processing => stats.processing = count,
            ProcessingStatus::Completed => stats.completed = count,
            ProcessingStatus::Failed => stats.failed = count,
        }
    }
    Ok(stats)
}

/// Delete videos published more than `days` days ago.
pub async fn delete_published_before(db: &Database, days: i64) -> AppResult<usize> {
    if days < 1 {
        return Err(AppError::Validation(
            "days must be a positive number".to_string(),
        ));
    }
    let cutoff = Utc::now() - Duration::days(days);
    let deleted = db
        .with_connection(move |conn| {
            conn.execute(
                "DELETE FROM videos WHERE published_at IS NOT NULL AND published_at < ?1",
                [cutoff],
            )
        })
        .await?;
    info!("Deleted {deleted} videos published before {cutoff}");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewChannel;
    use crate::services::channel_service;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Database, i64) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("digest.db")).await.unwrap();
        let channel = channel_service::insert_channel(
            &db,
            &NewChannel {
                external_id: "UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string(),
                name: "Google Developers".to_string(),
                url: "https://www.youtube.com/@GoogleDevelopers".to_string(),
                thumbnail_url: None,
            },
        )
        .await
        .unwrap();
        (dir, db, channel.id)
    }

    fn new_video(external_id: &str, days_ago: i64) -> NewVideo {
        NewVideo {
            external_id: external_id.to_string(),
            title: format!("Video {external_id}"),
            thumbnail_url: None,
            published_at: Some(Utc::now() - Duration::days(days_ago)),
        }
    }

    async fn add(db: &Database, channel_id: i64, external_id: &str, days_ago: i64) -> bool {
        insert_if_absent(db, channel_id, &new_video(external_id, days_ago))
            .await
            .unwrap()
    }

    async fn id_of(db: &Database, external_id: &str) -> i64 {
        find_by_external_id(db, external_id).await.unwrap().unwrap().id
    }

    #[rocket::async_test]
    async fn duplicate_inserts_are_ignored() {
        let (_dir, db, channel_id) = setup().await;
        assert!(add(&db, channel_id, "aaaaaaaaaaa", 1).await);
        assert!(!add(&db, channel_id, "aaaaaaaaaaa", 1).await);
        assert_eq!(processing_stats(&db).await.unwrap().total, 1);
    }

    #[rocket::async_test]
    async fn deleting_channel_removes_its_videos() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 1).await;
        add(&db, channel_id, "bbbbbbbbbbb", 2).await;

        channel_service::delete_channel(&db, channel_id).await.unwrap();

        let orphans: i64 = db
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM videos WHERE channel_id NOT IN (SELECT id FROM channels)",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(processing_stats(&db).await.unwrap().total, 0);
    }

    #[rocket::async_test]
    async fn begin_is_exclusive() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 1).await;
        let id = id_of(&db, "aaaaaaaaaaa").await;

        let video = begin_processing(&db, id).await.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Processing);
        assert!(matches!(begin_processing(&db, id).await, Err(AppError::Conflict(_))));
        assert!(matches!(begin_processing(&db, 999).await, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn completed_videos_carry_both_summaries() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 1).await;
        let id = id_of(&db, "aaaaaaaaaaa").await;

        assert!(matches!(
            mark_completed(&db, id, "captions", "en", "short", "detailed").await,
            Err(AppError::Conflict(_))
        ));

        begin_processing(&db, id).await.unwrap();
        let video = mark_completed(&db, id, "captions", "en", "short", "detailed")
            .await
            .unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Completed);
        assert_eq!(video.short_summary.as_deref(), Some("short"));
        assert_eq!(video.detailed_summary.as_deref(), Some("detailed"));
        assert_eq!(video.caption_language.as_deref(), Some("en"));
        assert!(matches!(begin_processing(&db, id).await, Err(AppError::Conflict(_))));
    }

    #[rocket::async_test]
    async fn failed_videos_hold_no_summaries_and_can_be_retried() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 1).await;
        let id = id_of(&db, "aaaaaaaaaaa").await;

        begin_processing(&db, id).await.unwrap();
        mark_failed(&db, id, "no captions").await.unwrap();
        let video = get_video(&db, id).await.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Failed);
        assert_eq!(video.error_message.as_deref(), Some("no captions"));
        assert!(video.short_summary.is_none() && video.detailed_summary.is_none());

        let retried = begin_processing(&db, id).await.unwrap();
        assert_eq!(retried.processing_status, ProcessingStatus::Processing);
        assert!(retried.error_message.is_none());
    }

    #[rocket::async_test]
    async fn reset_only_applies_to_stuck_or_failed() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 1).await;
        let id = id_of(&db, "aaaaaaaaaaa").await;

        assert!(matches!(reset_video(&db, id).await, Err(AppError::Conflict(_))));
        begin_processing(&db, id).await.unwrap();
        let video = reset_video(&db, id).await.unwrap();
        assert_eq!(video.processing_status, ProcessingStatus::Pending);
    }

    #[rocket::async_test]
    async fn selection_is_oldest_first_and_limited() {
        let (_dir, db, channel_id) = setup().await;
        for external_id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"] {
            add(&db, channel_id, external_id, 1).await;
        }

        let selected = select_by_status(&db, ProcessingStatus::Pending, 2).await.unwrap();
        let ids: Vec<&str> = selected.iter().map(|v| v.external_id.as_str()).collect();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
    }

    #[rocket::async_test]
    async fn listing_filters_and_paginates() {
        let (_dir, db, channel_id) = setup().await;
        for (i, external_id) in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"].iter().enumerate() {
            add(&db, channel_id, external_id, i as i64).await;
        }
        let id = id_of(&db, "bbbbbbbbbbb").await;
        begin_processing(&db, id).await.unwrap();

        let page = list_videos(
            &db,
            &VideoQuery {
                per_page: 2,
                ..VideoQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.videos.len(), 2);
        assert_eq!(page.videos[0].external_id, "aaaaaaaaaaa");
        assert_eq!(page.videos[0].channel_name.as_deref(), Some("Google Developers"));

        let by_status = list_videos(
            &db,
            &VideoQuery {
                sort: VideoSort::Status,
                ..VideoQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_status.videos[0].external_id, "bbbbbbbbbbb");

        let pending = list_videos(
            &db,
            &VideoQuery {
                status: Some(ProcessingStatus::Pending),
                channel_id: Some(channel_id),
                ..VideoQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pending.total, 2);
    }

    #[rocket::async_test]
    async fn huge_page_numbers_yield_an_empty_page() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 1).await;

        let page = list_videos(
            &db,
            &VideoQuery {
                page: i64::MAX,
                per_page: 50,
                ..VideoQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.videos.is_empty());
        assert!(page.page > 1);
    }

    #[rocket::async_test]
    async fn cleanup_removes_only_old_videos() {
        let (_dir, db, channel_id) = setup().await;
        add(&db, channel_id, "aaaaaaaaaaa", 10).await;
        add(&db, channel_id, "bbbbbbbbbbb", 1).await;

        assert!(matches!(
            delete_published_before(&db, 0).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(delete_published_before(&db, 3).await.unwrap(), 1);
        assert!(find_by_external_id(&db, "aaaaaaaaaaa").await.unwrap().is_none());
        assert!(find_by_external_id(&db, "bbbbbbbbbbb").await.unwrap().is_some());
    }
}
