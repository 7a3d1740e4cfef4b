#[macro_use]
extern crate rocket;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::{create_cors, Config};
use crate::db::Database;
use crate::models::ErrorResponse;
use crate::services::captions::{TranscriptSource, YouTubeTranscripts};
use crate::services::processor::Pipeline;
use crate::services::summarizer::{GeminiClient, Summarizer, TextGenerator};
use crate::services::youtube::{VideoPlatform, YouTubeClient};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub platform: Arc<dyn VideoPlatform>,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        platform: Arc<dyn VideoPlatform>,
        transcripts: Arc<dyn TranscriptSource>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let pipeline = Pipeline::new(
            transcripts,
            Summarizer::new(generator),
            config.caption_languages.clone(),
        );
        AppState {
            config,
            db,
            platform,
            pipeline,
        }
    }
}

/// Wire the production clients for YouTube, the transcript service and Gemini.
pub async fn create_app_state(config: Config) -> anyhow::Result<AppState> {
    let db = Database::open(&config.database_path).await?;
    let platform = YouTubeClient::new(&config.youtube_api_key, config.http_timeout)?;
    let generator = GeminiClient::new(
        &config.gemini_api_key,
        &config.gemini_model,
        config.http_timeout,
    )?;

    Ok(AppState::new(
        config,
        db,
        Arc::new(platform),
        Arc::new(YouTubeTranscripts),
        Arc::new(generator),
    ))
}

fn error_body(status: Status, error: &str, message: &str) -> (Status, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

#[catch(400)]
fn bad_request() -> (Status, Json<ErrorResponse>) {
    error_body(Status::BadRequest, "validation_error", "Malformed request")
}

#[catch(401)]
fn unauthorized() -> (Status, Json<ErrorResponse>) {
    error_body(
        Status::Unauthorized,
        "unauthorized",
        "Missing or invalid API token",
    )
}

#[catch(404)]
fn not_found(req: &Request) -> (Status, Json<ErrorResponse>) {
    error_body(
        Status::NotFound,
        "not_found",
        &format!("No route for {}", req.uri().path()),
    )
}

#[catch(422)]
fn unprocessable() -> (Status, Json<ErrorResponse>) {
    error_body(
        Status::UnprocessableEntity,
        "validation_error",
        "Request body or parameters could not be parsed",
    )
}

#[catch(500)]
fn internal_error() -> (Status, Json<ErrorResponse>) {
    error_body(
        Status::InternalServerError,
        "internal_error",
        "An internal error occurred",
    )
}

pub fn build_rocket(state: AppState) -> anyhow::Result<Rocket<Build>> {
    let cors = create_cors(&state.config)?;
    let figment = rocket::Config::figment()
        .merge(("address", state.config.bind_address.clone()))
        .merge(("port", state.config.port));

    Ok(rocket::custom(figment)
        .manage(state)
        .mount(
            "/api",
            routes![
                api::auth::login,
                api::auth::health,
                api::admin::stats,
                api::admin::cleanup,
                api::channel::list_channels,
                api::channel::add_channel,
                api::channel::get_channel,
                api::channel::delete_channel,
                api::video::list_videos,
                api::video::get_video,
                api::video::delete_video,
                api::video::reset_video,
                api::pipeline::sync_channel,
                api::pipeline::sync_all,
                api::pipeline::process_video,
                api::pipeline::process_pending,
                api::pipeline::reprocess_failed,
                api::pipeline::process_url,
                api::pipeline::captions,
                api::pipeline::summarize,
            ],
        )
        .register(
            "/",
            catchers![bad_request, unauthorized, not_found, unprocessable, internal_error],
        )
        .attach(cors))
}
