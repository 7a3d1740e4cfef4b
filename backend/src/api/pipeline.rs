use crate::config::AuthUser;
use crate::error::AppResult;
use crate::models::{
    AdhocResult, BatchReport, CaptionsResponse, ProcessUrlRequest, SummarizeRequest,
    SummarizeResponse, SyncAllReport, SyncReport, Video, VideoUrlRequest,
};
use crate::services::fetcher;
use crate::AppState;
use rocket::serde::json::Json;
use rocket::{post, State};

#[post("/sync/channel/<id>?<max_videos>")]
pub async fn sync_channel(
    _user: AuthUser,
    state: &State<AppState>,
    id: i64,
    max_videos: Option<i64>,
) -> AppResult<Json<SyncReport>> {
    let report = fetcher::sync_channel(
        &state.db,
        state.platform.as_ref(),
        id,
        max_videos,
        state.config.sync_lookback_days,
    )
    .await?;
    Ok(Json(report))
}

#[post("/sync/all?<max_videos>")]
pub async fn sync_all(
    _user: AuthUser,
    state: &State<AppState>,
    max_videos: Option<i64>,
) -> AppResult<Json<SyncAllReport>> {
    let report = fetcher::sync_all_channels(
        &state.db,
        state.platform.as_ref(),
        max_videos,
        state.config.sync_lookback_days,
    )
    .await?;
    Ok(Json(report))
}

#[post("/process/video/<id>")]
pub async fn process_video(_user: AuthUser, state: &State<AppState>, id: i64) -> AppResult<Json<Video>> {
    Ok(Json(state.pipeline.process_video(&state.db, id).await?))
}

#[post("/process/pending?<limit>")]
pub async fn process_pending(
    _user: AuthUser,
    state: &State<AppState>,
    limit: Option<i64>,
) -> AppResult<Json<BatchReport>> {
    Ok(Json(state.pipeline.process_pending(&state.db, limit).await?))
}

#[post("/process/failed?<limit>")]
pub async fn reprocess_failed(
    _user: AuthUser,
    state: &State<AppState>,
    limit: Option<i64>,
) -> AppResult<Json<BatchReport>> {
    Ok(Json(state.pipeline.reprocess_failed(&state.db, limit).await?))
}

#[post("/process/url", data = "<request>")]
pub async fn process_url(
    _user: AuthUser,
    state: &State<AppState>,
    request: Json<ProcessUrlRequest>,
) -> AppResult<Json<AdhocResult>> {
    let result = state
        .pipeline
        .process_url(
            &state.db,
            state.platform.as_ref(),
            &request.video_url,
            request.save,
        )
        .await?;
    Ok(Json(result))
}

#[post("/captions", data = "<request>")]
pub async fn captions(
    _user: AuthUser,
    state: &State<AppState>,
    request: Json<VideoUrlRequest>,
) -> AppResult<Json<CaptionsResponse>> {
    let (external_id, captions) = state.pipeline.captions_for_url(&request.video_url).await?;
    Ok(Json(CaptionsResponse {
        external_id,
        language: captions.language,
        captions: captions.text,
    }))
}

#[post("/summarize", data = "<request>")]
pub async fn summarize(
    _user: AuthUser,
    state: &State<AppState>,
    request: Json<SummarizeRequest>,
) -> AppResult<Json<SummarizeResponse>> {
    let summaries = state
        .pipeline
        .summarize_text(&request.caption_text, request.language.as_deref())
        .await?;
    Ok(Json(SummarizeResponse {
        short_summary: summaries.short,
        detailed_summary: summaries.detailed,
    }))
}
