//! Generic result/error resprentation(s).

use std::convert::Infallible;

use axum::{
    extract::rejection::{ExtensionRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{otp, token};

/// Standard return type out of routes / handlers
pub type AppResult<T> = std::result::Result<T, AppError>;

const INTERNAL_DETAIL: &str = "Something went wrong, please try again later";

/// Encodes [JSONAPI error object responses](https://jsonapi.org/examples/#error-objects).
///
/// JSONAPI error object -  ALL Fields are technically optional.
///
/// This struct uses the following guidelines:
///
/// 1. Always encode the StatusCode of the response
/// 2. Set the title to the `canonical_reason` of the status code.
///    According to spec, this should NOT change over time.
/// 3. Server-side failures get a generic detail. The cause is logged, not returned.
#[derive(ToSchema, thiserror::Error, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct AppError {
    #[schema(value_type = u16, example = 410)]
    #[serde(with = "crate::error::serde_status_code")]
    pub(crate) status: StatusCode,
    #[schema(example = "Code expired")]
    pub(crate) detail: Option<String>,
    #[schema(example = "Gone")]
    pub(crate) title: Option<String>,
}

impl AppError {
    /// New instance of [AppError].
    pub fn new<M: ToString>(status_code: StatusCode, message: Option<M>) -> AppError {
        Self {
            status: status_code,
            title: Self::canonical_reason_to_string(&status_code),
            detail: message.map(|m| m.to_string()),
        }
    }

    /// [AppError] for [StatusCode::NOT_FOUND].
    pub fn not_found(what: impl std::fmt::Display) -> AppError {
        Self::new(StatusCode::NOT_FOUND, Some(format!("{what} not found")))
    }

    /// [AppError] for [StatusCode::UNAUTHORIZED].
    pub fn unauthorized(reason: impl ToString) -> AppError {
        Self::new(StatusCode::UNAUTHORIZED, Some(reason))
    }

    /// [AppError] for [StatusCode::INTERNAL_SERVER_ERROR] that logs `err`
    /// instead of returning it.
    pub fn internal(err: impl std::fmt::Debug) -> AppError {
        tracing::error!(?err, "Internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, Some(INTERNAL_DETAIL))
    }

    fn canonical_reason_to_string(status_code: &StatusCode) -> Option<String> {
        status_code.canonical_reason().map(|r| r.to_string())
    }
}

#[derive(Debug, Deserialize, Serialize)]
/// Error in JSON API response format.
pub struct ErrorResponse {
    pub(crate) errors: Vec<AppError>,
}

impl From<AppError> for ErrorResponse {
    fn from(e: AppError) -> Self {
        Self { errors: vec![e] }
    }
}

impl From<AppError> for (StatusCode, Json<ErrorResponse>) {
    fn from(app_error: AppError) -> Self {
        (app_error.status, Json(app_error.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_response: (StatusCode, Json<ErrorResponse>) = self.into();
        error_response.into_response()
    }
}

impl From<otp::Error> for AppError {
    fn from(err: otp::Error) -> Self {
        if !err.is_client_error() {
            return Self::internal(err);
        }

        let status = match err {
            otp::Error::Expired => StatusCode::GONE,
            otp::Error::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        };

        Self::new(status, Some(err))
    }
}

impl From<token::Error> for AppError {
    fn from(err: token::Error) -> Self {
        match err {
            token::Error::Encoding(_) => Self::internal(err),
            _ => Self::unauthorized(err),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ValidationErrors>() {
            Ok(err) => return Self::from(err),
            Err(e) => e,
        };

        let err = match err.downcast::<token::Error>() {
            Ok(err) => return Self::from(err),
            Err(e) => e,
        };

        Self::internal(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Some(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(value: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Some(value.body_text()))
    }
}

impl From<ExtensionRejection> for AppError {
    fn from(value: ExtensionRejection) -> Self {
        Self::internal(value)
    }
}

impl From<Infallible> for AppError {
    fn from(the_impossible: Infallible) -> Self {
        match the_impossible {}
    }
}

/// Serialize/Deserializer for status codes.
///
/// This is needed because status code according to JSON API spec must
/// be the status code as a STRING.
///
/// We could have used http_serde, but it encodes the status code as a NUMBER.
pub mod serde_status_code {
    use http::StatusCode;
    use serde::{de::Unexpected, Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize [StatusCode]s.
    pub fn serialize<S: Serializer>(status: &StatusCode, ser: S) -> Result<S::Ok, S::Error> {
        String::serialize(&status.as_u16().to_string(), ser)
    }

    /// Deserialize [StatusCode]s.
    pub fn deserialize<'de, D>(de: D) -> Result<StatusCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let str = String::deserialize(de)?;
        StatusCode::from_bytes(str.as_bytes()).map_err(|_| {
            serde::de::Error::invalid_value(
                Unexpected::Str(str.as_str()),
                &"A valid http status code",
            )
        })
    }
}

// Needed to support thiserror::Error, outputs debug for AppError
impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
/// Parse the app error out of the json body
pub(crate) async fn parse_error(response: Response) -> AppError {
    let body_bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let mut err_response: ErrorResponse = serde_json::from_slice(&body_bytes).unwrap();
    err_response.errors.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn test_from_anyhow_error_hides_cause() {
        let err: AppError = anyhow::anyhow!("connection refused: db.internal:5432").into();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail.as_deref(), Some(INTERNAL_DETAIL));
        assert_eq!(
            err.title,
            StatusCode::INTERNAL_SERVER_ERROR
                .canonical_reason()
                .map(|r| r.to_string())
        );
    }

    #[test]
    fn test_otp_error_statuses() {
        let cases = [
            (otp::Error::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (otp::Error::NotFound, StatusCode::BAD_REQUEST),
            (otp::Error::Mismatch, StatusCode::BAD_REQUEST),
            (otp::Error::Expired, StatusCode::GONE),
            (otp::Error::TooManyAttempts, StatusCode::TOO_MANY_REQUESTS),
            (
                otp::Error::Delivery(anyhow::anyhow!("smtp down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                otp::Error::Storage(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                otp::Error::Token(token::Error::Encoding("bad key".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_token_errors_are_unauthorized() {
        for err in [
            token::Error::Malformed,
            token::Error::InvalidSignature,
            token::Error::InvalidIssuer,
            token::Error::Expired,
        ] {
            assert_eq!(AppError::from(err).status, StatusCode::UNAUTHORIZED);
        }

        let err: AppError = anyhow::Error::new(token::Error::Expired).into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_json_api_error_response() -> TestResult {
        // verify that our json api response complies with the standard
        let err = AppError::from(otp::Error::Expired);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GONE);

        let err = parse_error(response).await;

        // Check that the result is all good
        assert_eq!(err.status, StatusCode::GONE);
        assert_eq!(
            err.title,
            StatusCode::GONE.canonical_reason().map(|r| r.to_string())
        );
        assert_eq!(err.detail.as_deref(), Some("Code expired"));

        Ok(())
    }
}
