//! OpenAPI doc generation.

use crate::{
    error::AppError,
    extract::bearer_addon::BearerAddon,
    routes::{health, logout, otp, ping, profile},
};
use otp_core::common::{
    MessageResponse, OtpSendRequest, OtpVerifyRequest, ProfileResponse, TokenResponse,
};
use utoipa::OpenApi;

/// API documentation generator.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck,
        ping::get,
        otp::send,
        otp::verify,
        profile::get,
        logout::logout,
    ),
    components(
        schemas(
            AppError,
            OtpSendRequest,
            OtpVerifyRequest,
            MessageResponse,
            TokenResponse,
            ProfileResponse,
            health::HealthcheckResponse
        )
    ),
    modifiers(&BearerAddon),
)]

/// Tied to OpenAPI documentation.
#[derive(Debug)]
pub struct ApiDoc;
