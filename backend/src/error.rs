use crate::models::ErrorResponse;
use log::{error, warn};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("No captions available: {0}")]
    NoCaptions(String),

    #[error("YouTube API error: {0}")]
    PlatformApi(String),

    #[error("Transcript API error: {0}")]
    TranscriptApi(String),

    #[error("Generation API error: {0}")]
    GenerationApi(String),

    #[error("Database error: {0}")]
    Datastore(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> Status {
        match self {
            AppError::Validation(_) => Status::BadRequest,
            AppError::Unauthorized(_) => Status::Unauthorized,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Conflict(_) => Status::Conflict,
            AppError::NoCaptions(_) => Status::UnprocessableEntity,
            AppError::PlatformApi(_) | AppError::TranscriptApi(_) | AppError::GenerationApi(_) => {
                Status::BadGateway
            }
            AppError::Datastore(_) | AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::NoCaptions(_) => "no_captions",
            AppError::PlatformApi(_) => "youtube_api_error",
            AppError::TranscriptApi(_) => "transcript_api_error",
            AppError::GenerationApi(_) => "generation_api_error",
            AppError::Datastore(_) => "datastore_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to hand back to the client. Datastore details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Datastore(_) => "A database error occurred, please try again later".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(
            self,
            AppError::NoCaptions(_)
                | AppError::PlatformApi(_)
                | AppError::TranscriptApi(_)
                | AppError::GenerationApi(_)
        )
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!("{} {} failed: {self}", request.method(), request.uri());
        } else if self.is_external() {
            warn!("{} {} upstream failure: {self}", request.method(), request.uri());
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.public_message(),
        };
        (status, Json(body)).respond_to(request)
    }
}
