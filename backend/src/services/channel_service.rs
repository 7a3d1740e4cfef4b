use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Channel, NewChannel};
use crate::services::youtube::VideoPlatform;
use crate::utils::parse_channel_url;
use chrono::Utc;
use log::info;
use rusqlite::{params, OptionalExtension, Row};

const CHANNEL_COLUMNS: &str = "
    c.id, c.external_id, c.name, c.url, c.thumbnail_url, c.created_at,
    (SELECT COUNT(*) FROM videos v WHERE v.channel_id = c.id) AS video_count";

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get("id")?,
        external_id: row.get("external_id")?,
        name: row.get("name")?,
        url: row.get("url")?,
        thumbnail_url: row.get("thumbnail_url")?,
        created_at: row.get("created_at")?,
        video_count: row.get("video_count")?,
    })
}

pub async fn list_channels(db: &Database) -> AppResult<Vec<Channel>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels c ORDER BY c.name COLLATE NOCASE"
        ))?;
        let channels = stmt
            .query_map([], channel_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(channels)
    })
    .await
}

pub async fn find_channel(db: &Database, id: i64) -> AppResult<Option<Channel>> {
    db.with_connection(move |conn| {
        conn.query_row(
            &format!("SELECT {CHANNEL_COLUMNS} FROM channels c WHERE c.id = ?1"),
            [id],
            channel_from_row,
        )
        .optional()
    })
    .await
}

pub async fn get_channel(db: &Database, id: i64) -> AppResult<Channel> {
    find_channel(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Channel {id} not found")))
}

pub async fn find_by_external_id(db: &Database, external_id: &str) -> AppResult<Option<Channel>> {
    let external_id = external_id.to_string();
    db.with_connection(move |conn| {
        conn.query_row(
            &format!("SELECT {CHANNEL_COLUMNS} FROM channels c WHERE c.external_id = ?1"),
            [&external_id],
            channel_from_row,
        )
        .optional()
    })
    .await
}

/// Insert a channel; an already-registered external id is a conflict.
pub async fn insert_channel(db: &Database, channel: &NewChannel) -> AppResult<Channel> {
    let row = channel.clone();
    let inserted = db
        .with_connection(move |conn| {
            conn.execute(
                "INSERT INTO channels (external_id, name, url, thumbnail_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(external_id) DO NOTHING",
                params![
                    row.external_id,
                    row.name,
                    row.url,
                    row.thumbnail_url,
                    Utc::now()
                ],
            )
        })
        .await?;
    if inserted == 0 {
        return Err(AppError::Conflict(format!(
            "Channel '{}' is already registered",
            channel.name
        )));
    }

    find_by_external_id(db, &channel.external_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Channel {} vanished after insert", channel.external_id))
        })
}

/// Subscribe to the channel behind `channel_url`.
pub async fn add_channel(
    db: &Database,
    platform: &dyn VideoPlatform,
    channel_url: &str,
) -> AppResult<Channel> {
    let reference = parse_channel_url(channel_url)?;
    let external_id = platform.resolve_channel_id(&reference).await?;

    if let Some(existing) = find_by_external_id(db, &external_id).await? {
        return Err(AppError::Conflict(format!(
            "Channel '{}' is already registered",
            existing.name
        )));
    }

    let details = platform.channel_details(&external_id).await?;
    let channel = insert_channel(
        db,
        &NewChannel {
            external_id: details.external_id,
            name: details.name,
            url: channel_url.trim().to_string(),
            thumbnail_url: details.thumbnail_url,
        },
    )
    .await?;
    info!(
        "Added channel '{}' ({}) as #{}",
        channel.name, channel.external_id, channel.id
    );
    Ok(channel)
}

/// Delete a channel; its videos go with it.
pub async fn delete_channel(db: &Database, id: i64) -> AppResult<Channel> {
    let channel = get_channel(db, id).await?;
    db.with_connection(move |conn| conn.execute("DELETE FROM channels WHERE id = ?1", [id]))
        .await?;
    info!(
        "Deleted channel '{}' and its {} videos",
        channel.name, channel.video_count
    );
    Ok(channel)
}

pub async fn count_channels(db: &Database) -> AppResult<i64> {
    db.with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM channels", [], |row| row.get(0)))
        .await
}
