use crate::config::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{
    MessageResponse, ProcessingStatus, SortOrder, Video, VideoListResponse, VideoQuery, VideoSort,
};
use crate::services::video_service;
use crate::utils::sanitize_pagination;
use crate::AppState;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};

fn parse_sort(sort: Option<&str>) -> AppResult<VideoSort> {
    match sort.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("published") => Ok(VideoSort::Published),
        Some("status") => Ok(VideoSort::Status),
        Some("created") => Ok(VideoSort::Created),
        Some(other) => Err(AppError::Validation(format!(
            "Invalid sort '{other}' (expected published, status or created)"
        ))),
    }
}

fn parse_order(order: Option<&str>) -> AppResult<SortOrder> {
    match order.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("desc") => Ok(SortOrder::Desc),
        Some("asc") => Ok(SortOrder::Asc),
        Some(other) => Err(AppError::Validation(format!(
            "Invalid order '{other}' (expected asc or desc)"
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
#[get("/videos?<page>&<per_page>&<channel_id>&<status>&<sort>&<order>")]
pub async fn list_videos(
    _user: AuthUser,
    state: &State<AppState>,
    page: Option<i64>,
    per_page: Option<i64>,
    channel_id: Option<i64>,
    status: Option<&str>,
    sort: Option<&str>,
    order: Option<&str>,
) -> AppResult<Json<VideoListResponse>> {
    let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<ProcessingStatus>().map_err(AppError::Validation)?),
        None => None,
    };
    let (page, per_page) = sanitize_pagination(page, per_page);

    let query = VideoQuery {
        page,
        per_page,
        channel_id,
        status,
        sort: parse_sort(sort)?,
        order: parse_order(order)?,
    };
    Ok(Json(video_service::list_videos(&state.db, &query).await?))
}

#[get("/videos/<id>")]
pub async fn get_video(_user: AuthUser, state: &State<AppState>, id: i64) -> AppResult<Json<Video>> {
    Ok(Json(video_service::get_video(&state.db, id).await?))
}

#[delete("/videos/<id>")]
pub async fn delete_video(
    _user: AuthUser,
    state: &State<AppState>,
    id: i64,
) -> AppResult<Json<MessageResponse>> {
    video_service::delete_video(&state.db, id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Video {id} deleted"),
    }))
}

#[post("/videos/<id>/reset")]
pub async fn reset_video(_user: AuthUser, state: &State<AppState>, id: i64) -> AppResult<Json<Video>> {
    Ok(Json(video_service::reset_video(&state.db, id).await?))
}
