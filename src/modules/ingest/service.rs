use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use validator::Validate;

use super::dto::{validation_message, UploadVideoRequest, UploadVideoResponse};
use crate::modules::jobs::model::{JobStatus, TranscodeJob, VideoMetadata};
use crate::modules::jobs::repository::JobRepository;
use crate::pipeline;
use crate::pipeline::error::PipelineError;
use crate::pipeline::source::{classify, IncomingSource};
use crate::state::AppState;

pub struct IngestService;

impl IngestService {
    /// Full upload flow: validate, persist the job, run the pipeline, and
    /// shape the response. Any pipeline failure marks the job failed before
    /// it surfaces.
    pub async fn upload(
        state: AppState,
        payload: serde_json::Value,
    ) -> Result<UploadVideoResponse, PipelineError> {
        let req: UploadVideoRequest = serde_json::from_value(payload)
            .map_err(|e| PipelineError::Validation(format!("invalid request body: {}", e)))?;

        req.metadata
            .validate()
            .map_err(|e| PipelineError::Validation(validation_message(&e)))?;

        let source = classify(&req.video_file)?;

        let job = Self::receive(&state, req.metadata.into(), source).await?;
        info!(job = %job.id, episode = %job.metadata.episode_id, "📦 Job received");

        let cancel = CancellationToken::new();
        match pipeline::run_job(&state, &job, &cancel).await {
            Ok(outcome) => {
                info!(
                    job = %job.id,
                    duration = outcome.duration_seconds,
                    bytes = outcome.total_bytes,
                    "Upload published"
                );
                Ok(UploadVideoResponse {
                    success: true,
                    video_url: outcome.locators.video_url,
                    thumbnail_url: outcome.locators.thumbnail_url,
                    qualities: outcome.qualities,
                })
            }
            Err(err) => {
                if let Err(mark_err) = JobRepository::mark_failed(&state.db, &job.id).await {
                    error!(job = %job.id, "Could not mark job failed: {}", mark_err);
                }
                Err(err)
            }
        }
    }

    /// IngestReceiver: by the time this returns, the job exists durably in
    /// `Received` state and its source is reachable from durable state (URL,
    /// or the inline payload spilled under the job prefix).
    async fn receive(
        state: &AppState,
        metadata: VideoMetadata,
        source: IncomingSource,
    ) -> Result<TranscodeJob, PipelineError> {
        let mut job = TranscodeJob {
            id: generate_job_id(),
            metadata,
            source_ref: String::new(),
            status: JobStatus::Received,
            created_at: OffsetDateTime::now_utc(),
        };

        job.source_ref = match source {
            IncomingSource::Url(url) => url.to_string(),
            IncomingSource::Inline(bytes) => {
                let key = format!("{}source.bin", job.key_prefix());
                state
                    .storage
                    .put_object(&key, bytes, "application/octet-stream", None)
                    .await
                    .map_err(|e| PipelineError::Internal(e.into()))?;
                key
            }
        };

        JobRepository::create(&state.db, &job)
            .await
            .map_err(PipelineError::Internal)?;

        Ok(job)
    }
}

/// Millisecond timestamp plus a random suffix: sortable by receipt time and
/// unique enough that concurrent uploads never share a prefix.
fn generate_job_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{}-{:08x}", millis, rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_timestamped_with_a_hex_suffix() {
        let id = generate_job_id();
        let (stamp, suffix) = id.split_once('-').unwrap();
        assert!(stamp.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn job_ids_do_not_collide_across_calls() {
        let a = generate_job_id();
        let b = generate_job_id();
        assert_ne!(a, b);
    }
}
