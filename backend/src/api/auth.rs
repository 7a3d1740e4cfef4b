use crate::error::{AppError, AppResult};
use crate::models::{HealthResponse, LoginRequest, LoginResponse};
use crate::AppState;
use log::{info, warn};
use rocket::serde::json::Json;
use rocket::{get, post, State};

#[post("/login", data = "<login_request>")]
pub async fn login(
    state: &State<AppState>,
    login_request: Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = &state.config.user;
    if !user.check_credentials(&login_request.username, &login_request.password) {
        warn!("Failed login attempt for '{}'", login_request.username);
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    info!("User '{}' logged in", user.username);
    Ok(Json(LoginResponse {
        success: true,
        token: user.api_token.clone(),
    }))
}

#[get("/health")]
pub async fn health(state: &State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await;
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
    })
}
