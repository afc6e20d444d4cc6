//! REST API module.
//!
//! Thin handlers: they extract identity and input, call the directory, the
//! workflow engine or the query service, and wrap the result in the envelope.

mod auth;
mod form;
mod members;
mod notifications;
mod profile;
mod status_change;

pub use auth::*;
pub use members::*;
pub use notifications::*;
pub use profile::*;
pub use status_change::*;

use axum::{
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(message, data))
}
