//! Session token extractor

use axum::{
    async_trait,
    extract::{FromRequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt,
};
use chrono::Utc;

use crate::{
    app_state::AppState, cookie::find_cookie, error::AppError, setups::ServerSetup,
    token::Claims,
};

/// A request that presented a valid session token, either as a bearer
/// token or (when cookie transport is enabled) in the session cookie.
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// The token's validated claims
    pub claims: Claims,
}

impl Authenticated {
    /// The verified identity
    pub fn identity(&self) -> &str {
        &self.claims.sub
    }
}

#[async_trait]
impl<S: ServerSetup> FromRequestParts<AppState<S>> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
            Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
            Err(_) if state.cookie_settings.enabled => {
                find_cookie(&parts.headers, &state.cookie_settings.name)
                    .ok_or_else(|| AppError::unauthorized("Missing credentials"))?
            }
            Err(_) => return Err(AppError::unauthorized("Missing credentials")),
        };

        let claims = state.tokens.validate(&token, Utc::now()).map_err(|err| {
            tracing::debug!(%err, "Rejected session token");
            AppError::from(err)
        })?;

        Ok(Self { claims })
    }
}
