use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Error body shared by every non-2xx response: a stable machine code plus
/// optional sanitized context. Raw internal error text never goes here.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub struct ApiError {
    pub code: &'static str,
    pub status: StatusCode,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode) -> Self {
        Self {
            code,
            status,
            details: None,
        }
    }

    pub fn with_details(code: &'static str, status: StatusCode, details: impl Into<String>) -> Self {
        Self {
            code,
            status,
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code.to_string(),
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

pub struct ApiSuccess<T>(pub T, pub StatusCode);

impl<T> IntoResponse for ApiSuccess<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let (body, status) = (self.0, self.1);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_omits_absent_details() {
        let body = ErrorBody {
            error: "encoding_failed".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"encoding_failed"}"#);
    }

    #[test]
    fn error_body_includes_details_when_present() {
        let body = ErrorBody {
            error: "invalid_request".to_string(),
            details: Some("metadata.episodeId is required".to_string()),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""details":"metadata.episodeId is required""#));
    }
}
