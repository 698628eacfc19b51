//! Logout route

use crate::{
    app_state::AppState,
    cookie,
    error::{AppError, AppResult},
    extract::json::Json,
    setups::ServerSetup,
};
use axum::{
    self,
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
};
use otp_core::common::MessageResponse;

/// POST handler for logging out.
///
/// Tokens are stateless, so this only removes the session cookie.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = MessageResponse),
    )
)]
pub async fn logout<S: ServerSetup>(
    State(state): State<AppState<S>>,
) -> AppResult<(StatusCode, HeaderMap, Json<MessageResponse>)> {
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        cookie::clear_cookie(&state.cookie_settings).map_err(AppError::internal)?,
    );

    Ok((
        StatusCode::OK,
        headers,
        Json(MessageResponse::new("Logged out")),
    ))
}
