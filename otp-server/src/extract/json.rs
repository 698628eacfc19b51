//! JSON extractor with JSON:API formatted rejections

use crate::error::AppError;
use axum::response::{IntoResponse, Response};
use axum_macros::FromRequest;
use serde::Serialize;

/// Like [axum::Json], but rejects malformed bodies with an [AppError].
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
