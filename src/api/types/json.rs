//! JSON extractor and response wrapper whose rejections use the API error body

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json as AxumJson,
};
use serde::{de::DeserializeOwned, Serialize};

use super::error::ApiError;

/// Drop-in for `axum::Json`: malformed bodies become `invalid_request_error`
/// responses instead of plain-text rejections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        AxumJson::<T>::from_request(req, state)
            .await
            .map(|AxumJson(value)| Json(value))
            .map_err(rejection_to_error)
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    let (message, code) = match &rejection {
        JsonRejection::JsonDataError(err) => (
            format!("Request body does not match the expected shape: {}", err.body_text()),
            "invalid_body",
        ),
        JsonRejection::JsonSyntaxError(err) => (
            format!("Request body is not valid JSON: {}", err.body_text()),
            "json_parse_error",
        ),
        JsonRejection::MissingJsonContentType(_) => (
            "Expected 'Content-Type: application/json'".to_string(),
            "missing_content_type",
        ),
        other => (other.body_text(), "invalid_body"),
    };

    let mut error = ApiError::bad_request(message).with_code(code);
    error.status = rejection.status();
    error
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        AxumJson(self.0).into_response()
    }
}
