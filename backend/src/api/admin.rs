use crate::config::AuthUser;
use crate::error::AppResult;
use crate::models::{CleanupReport, DashboardStats};
use crate::services::{channel_service, video_service};
use crate::AppState;
use log::info;
use rocket::serde::json::Json;
use rocket::{get, post, State};

const DEFAULT_CLEANUP_DAYS: i64 = 3;

#[get("/stats")]
pub async fn stats(_user: AuthUser, state: &State<AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = DashboardStats {
        channels: channel_service::count_channels(&state.db).await?,
        videos: video_service::processing_stats(&state.db).await?,
    };
    info!("Stats retrieved: {} channels, {} videos", stats.channels, stats.videos.total);
    Ok(Json(stats))
}

#[post("/maintenance/cleanup?<days>")]
pub async fn cleanup(
    user: AuthUser,
    state: &State<AppState>,
    days: Option<i64>,
) -> AppResult<Json<CleanupReport>> {
    let days = days.unwrap_or(DEFAULT_CLEANUP_DAYS);
    let deleted = video_service::delete_published_before(&state.db, days).await?;
    info!("Cleanup requested by '{}' removed {deleted} videos", user.0);
    Ok(Json(CleanupReport { days, deleted }))
}
