//! One-time passcode routes

use crate::{
    app_state::AppState,
    cookie,
    error::{AppError, AppResult},
    extract::json::Json,
    otp,
    setups::ServerSetup,
};
use axum::{
    self,
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
};
use chrono::Utc;
use otp_core::common::{MessageResponse, OtpSendRequest, OtpVerifyRequest, TokenResponse};

/// POST handler for requesting a code by email
#[utoipa::path(
    post,
    path = "/otp/send",
    request_body = OtpSendRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Invalid email address or body", body = AppError),
        (status = 500, description = "Code could not be stored or delivered", body = AppError),
    )
)]
pub async fn send<S: ServerSetup>(
    State(state): State<AppState<S>>,
    Json(request): Json<OtpSendRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    otp::issue(
        &state.store,
        &state.verification_code_sender,
        &state.otp_settings,
        &request,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Verification code sent")),
    ))
}

/// POST handler for exchanging a code for a session token
#[utoipa::path(
    post,
    path = "/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Code accepted, session token issued", body = TokenResponse),
        (status = 400, description = "Wrong code, no active code, or invalid body", body = AppError),
        (status = 410, description = "Code expired", body = AppError),
        (status = 429, description = "Too many failed attempts", body = AppError),
    )
)]
pub async fn verify<S: ServerSetup>(
    State(state): State<AppState<S>>,
    Json(request): Json<OtpVerifyRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<TokenResponse>)> {
    let verified = otp::verify(
        &state.store,
        &state.tokens,
        &state.otp_settings,
        &request,
        Utc::now(),
    )
    .await?;

    let mut headers = HeaderMap::new();
    if state.cookie_settings.enabled {
        let cookie = cookie::session_cookie(
            &state.cookie_settings,
            &verified.token.token,
            state.tokens.ttl(),
        )
        .map_err(AppError::internal)?;
        headers.insert(SET_COOKIE, cookie);
    }

    Ok((
        StatusCode::OK,
        headers,
        Json(TokenResponse {
            message: "Verification successful".to_string(),
            token: verified.token.token,
            expires_at: verified.token.expires_at,
        }),
    ))
}
