use axum::http::StatusCode;
use thiserror::Error;

use crate::common::response::ApiError;

/// Typed failure taxonomy for the ingestion pipeline. Each variant carries
/// enough context to target a retry; the wire only ever sees the stable code
/// and sanitized detail, full causes go to the log.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("source container could not be probed")]
    UnprobeableSource(#[source] anyhow::Error),

    #[error("encoding {quality} failed")]
    Encoding {
        quality: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("publishing {artifact} failed")]
    Publish {
        artifact: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("episode {0} not found in catalog")]
    EpisodeNotFound(String),

    #[error("catalog commit failed")]
    Commit(#[source] anyhow::Error),

    #[error("job cancelled")]
    Cancelled,

    #[error("internal pipeline error")]
    Internal(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "invalid_request",
            PipelineError::UnprobeableSource(_) => "unprobeable_source",
            PipelineError::Encoding { .. } => "encoding_failed",
            PipelineError::Publish { .. } => "publish_failed",
            PipelineError::EpisodeNotFound(_) | PipelineError::Commit(_) => "commit_failed",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing detail. Never the underlying error text.
    pub fn public_details(&self) -> Option<String> {
        match self {
            PipelineError::Validation(msg) => Some(msg.clone()),
            PipelineError::Encoding { quality, .. } => {
                Some(format!("rendition {} did not complete", quality))
            }
            PipelineError::Publish { artifact, .. } => {
                Some(format!("artifact {} was not stored", artifact))
            }
            PipelineError::EpisodeNotFound(id) => {
                Some(format!("episode {} does not exist", id))
            }
            _ => None,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = err.status();
        let code = err.wire_code();
        match err.public_details() {
            Some(details) => ApiError::with_details(code, status, details),
            None => ApiError::new(code, status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn validation_maps_to_400_and_others_to_500() {
        assert_eq!(
            PipelineError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::UnprobeableSource(anyhow!("bad header")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::EpisodeNotFound("e1".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn wire_codes_are_stable_per_variant() {
        assert_eq!(
            PipelineError::Encoding {
                quality: "480p",
                source: anyhow!("exit status 1"),
            }
            .wire_code(),
            "encoding_failed"
        );
        assert_eq!(
            PipelineError::Commit(anyhow!("conn refused")).wire_code(),
            "commit_failed"
        );
        assert_eq!(PipelineError::Cancelled.wire_code(), "cancelled");
    }

    #[test]
    fn public_details_never_leak_the_cause() {
        let err = PipelineError::Encoding {
            quality: "480p",
            source: anyhow!("ffmpeg: segfault at 0xdeadbeef"),
        };
        let details = err.public_details().unwrap();
        assert!(details.contains("480p"));
        assert!(!details.contains("segfault"));
    }
}
