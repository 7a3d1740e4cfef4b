use crate::config::AuthUser;
use crate::error::AppResult;
use crate::models::{AddChannelRequest, Channel, MessageResponse};
use crate::services::channel_service;
use crate::AppState;
use log::info;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};

#[get("/channels")]
pub async fn list_channels(_user: AuthUser, state: &State<AppState>) -> AppResult<Json<Vec<Channel>>> {
    let channels = channel_service::list_channels(&state.db).await?;
    info!("Found {} channels.", channels.len());
    Ok(Json(channels))
}

#[post("/channels", data = "<request>")]
pub async fn add_channel(
    _user: AuthUser,
    state: &State<AppState>,
    request: Json<AddChannelRequest>,
) -> AppResult<(Status, Json<Channel>)> {
    let channel =
        channel_service::add_channel(&state.db, state.platform.as_ref(), &request.channel_url)
            .await?;
    Ok((Status::Created, Json(channel)))
}

#[get("/channels/<id>")]
pub async fn get_channel(_user: AuthUser, state: &State<AppState>, id: i64) -> AppResult<Json<Channel>> {
    Ok(Json(channel_service::get_channel(&state.db, id).await?))
}

#[delete("/channels/<id>")]
pub async fn delete_channel(
    _user: AuthUser,
    state: &State<AppState>,
    id: i64,
) -> AppResult<Json<MessageResponse>> {
    let channel = channel_service::delete_channel(&state.db, id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!(
            "Channel '{}' deleted along with {} videos",
            channel.name, channel.video_count
        ),
    }))
}
