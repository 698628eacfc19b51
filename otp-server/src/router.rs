//! Main [axum::Router] interface for webserver.

use crate::{
    app_state::AppState,
    routes::{fallback::notfound_404, health, logout, otp, ping, profile},
    setups::ServerSetup,
};
use axum::{
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

/// Setup main router for application.
pub fn setup_app_router<S: ServerSetup>(app_state: AppState<S>) -> Router {
    let api_router = Router::new()
        .route("/otp/send", post(otp::send::<S>))
        .route("/otp/verify", post(otp::verify::<S>))
        .route("/profile", get(profile::get::<S>))
        .route("/logout", post(logout::logout::<S>))
        .route("/ping", get(ping::get))
        .fallback(notfound_404)
        .with_state(app_state.clone());

    // Healthcheck layer
    let healthcheck_router = Router::new()
        .route("/healthcheck", get(health::healthcheck::<S>))
        .with_state(app_state);

    Router::merge(api_router, healthcheck_router)
}

/// CORS for browser clients.
///
/// With configured origins, credentials (the session cookie) are allowed for
/// exactly those origins. Otherwise any origin may call without credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
            http::header::ACCEPT,
        ]);

    let origins = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(origin) => Some(origin),
            Err(err) => {
                tracing::warn!(origin, ?err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins).allow_credentials(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get};
    use http::{Method, Request, StatusCode};
    use tower::ServiceExt;
    use testresult::TestResult;

    async fn preflight(layer: CorsLayer, origin: &str) -> anyhow::Result<http::HeaderMap> {
        let app = Router::new()
            .route("/profile", get(|| async { StatusCode::OK }))
            .layer(layer);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/profile")
                    .header(http::header::ORIGIN, origin)
                    .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())?,
            )
            .await?;

        Ok(response.headers().clone())
    }

    #[test_log::test(tokio::test)]
    async fn test_configured_origins_allow_credentials() -> TestResult {
        let headers = preflight(
            cors_layer(&["https://app.example.com".to_string()]),
            "https://app.example.com",
        )
        .await?;

        assert_eq!(
            headers.get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://app.example.com"))
        );
        assert_eq!(
            headers.get(http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_no_origins_allow_any() -> TestResult {
        let headers = preflight(cors_layer(&[]), "https://elsewhere.example.com").await?;

        assert_eq!(
            headers.get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
        assert!(headers
            .get(http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());

        Ok(())
    }
}
