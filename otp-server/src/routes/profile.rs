//! Profile route

use crate::{
    app_state::AppState,
    error::AppResult,
    extract::{auth::Authenticated, json::Json},
    setups::{OtpStore, ServerSetup},
};
use axum::{self, extract::State, http::StatusCode};
use otp_core::common::ProfileResponse;

/// GET handler for the profile of the token holder
#[utoipa::path(
    get,
    path = "/profile",
    security(
        ("session_bearer" = []),
        ("session_cookie" = []),
    ),
    responses(
        (status = 200, description = "Found profile", body = ProfileResponse),
        (status = 401, description = "Missing, invalid or expired session token", body = AppError),
    )
)]
pub async fn get<S: ServerSetup>(
    State(state): State<AppState<S>>,
    authenticated: Authenticated,
) -> AppResult<(StatusCode, Json<ProfileResponse>)> {
    let profile = state.store.find_profile(authenticated.identity()).await?;

    Ok((
        StatusCode::OK,
        Json(ProfileResponse {
            identity: authenticated.identity().to_string(),
            last_login: profile.map(|profile| profile.last_login),
        }),
    ))
}
