//! Fallback routes.

use crate::error::AppError;
use axum::http::Uri;

/// 404 fallback.
pub async fn notfound_404(uri: Uri) -> AppError {
    AppError::not_found(format!("Route {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use crate::{
        error::ErrorResponse,
        test_utils::{route_builder::RouteBuilder, test_context::TestContext},
    };
    use http::{Method, StatusCode};
    use testresult::TestResult;

    #[test_log::test(tokio::test)]
    async fn test_unknown_route_is_json_404() -> TestResult {
        let ctx = TestContext::new().await?;

        let (status, body) = RouteBuilder::new(ctx.app(), Method::GET, "/does/not/exist")
            .into_json_response::<ErrorResponse>()
            .await?;

        assert_eq!(status, StatusCode::NOT_FOUND);

        let err = &body.errors[0];
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.detail.as_deref(), Some("Route /does/not/exist not found"));

        Ok(())
    }
}
