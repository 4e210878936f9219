use anyhow::anyhow;
use futures_util::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::modules::catalog::model::EpisodeMediaFields;
use crate::modules::catalog::repository::CatalogRepository;
use crate::modules::jobs::model::{JobStatus, TranscodeJob};
use crate::modules::jobs::repository::JobRepository;
use crate::state::AppState;

pub mod encoder;
pub mod error;
pub mod manifest;
pub mod planner;
pub mod probe;
pub mod publisher;
pub mod retry;
pub mod source;

use encoder::{Encoder, RenditionArtifact, ThumbnailArtifact};
use error::PipelineError;
use planner::PlanPolicy;
use probe::Prober;
use publisher::{missing_artifacts, rendition_key, thumbnail_key, PublishedLocators, Publisher};
use retry::RetryPolicy;
use source::SourceResolver;

const RETRY_BACKOFF: Duration = Duration::from_secs(2);

pub struct PipelineOutcome {
    pub locators: PublishedLocators,
    pub qualities: Vec<String>,
    pub duration_seconds: f64,
    pub total_bytes: u64,
}

/// Drive one received job through plan → encode → publish → commit. Status
/// transitions are persisted at each stage boundary; any error leaves the
/// job for the caller to mark failed. Cancellation is honored up to the
/// moment `Committing` begins, after which the commit runs to completion.
pub async fn run_job(
    state: &AppState,
    job: &TranscodeJob,
    cancel: &CancellationToken,
) -> Result<PipelineOutcome, PipelineError> {
    let db = &state.db;
    let config = &state.config;

    // --- Planning ---
    JobRepository::transition(db, &job.id, JobStatus::Received, JobStatus::Planning)
        .await
        .map_err(PipelineError::Internal)?;

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|e| PipelineError::Internal(e.into()))?;
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("job-{}-", job.id))
        .tempdir_in(&config.work_dir)
        .map_err(|e| PipelineError::Internal(e.into()))?;
    let source_path = work_dir.path().join("source.bin");

    let resolver = SourceResolver {
        http: &state.http,
        storage: &state.storage,
    };
    resolver
        .fetch(&job.source_ref, &source_path)
        .await
        .map_err(PipelineError::Internal)?;

    let prober = Prober::new(&config.ffprobe_path);
    let probe = prober
        .probe(&source_path)
        .await
        .map_err(PipelineError::UnprobeableSource)?;

    let policy = PlanPolicy {
        max_height: if job.metadata.is_trailer {
            config
                .trailer_max_quality
                .as_deref()
                .and_then(planner::level_by_label)
                .map(|l| l.height)
        } else {
            None
        },
    };
    let plan = planner::plan(&probe, &policy);
    info!(job = %job.id, plan = ?plan.labels(), "Rendition plan computed");

    // --- Encoding ---
    JobRepository::transition(db, &job.id, JobStatus::Planning, JobStatus::Encoding)
        .await
        .map_err(PipelineError::Internal)?;

    let prefix = job.key_prefix();
    let encoder = Encoder::new(
        &config.ffmpeg_path,
        RetryPolicy::new(config.encode_attempts, RETRY_BACKOFF),
        Duration::from_secs(config.encode_timeout_secs),
        state.encode_slots.clone(),
    );

    // A retry of the same job finds its prefix populated from the previous
    // attempt; anything already durable with a recorded checksum is reused
    // instead of re-encoded.
    let mut completed: Vec<RenditionArtifact> = Vec::new();
    let mut pending = Vec::new();
    for level in plan.levels() {
        let key = rendition_key(&prefix, level.label);
        match state.storage.head_object(&key).await {
            Ok(Some(remote)) if remote.sha256.is_some() => {
                info!(job = %job.id, "♻️ Reusing durable {}", key);
                completed.push(RenditionArtifact {
                    quality: level.label,
                    byte_size: remote.byte_size,
                    storage_key: key,
                    checksum: remote.sha256.unwrap_or_default(),
                    local_path: None,
                });
            }
            Ok(_) => pending.push((*level, key)),
            Err(e) => {
                warn!(job = %job.id, "HEAD {} failed, re-encoding: {}", key, e);
                pending.push((*level, key));
            }
        }
    }

    let thumb_key = thumbnail_key(&prefix);
    let reused_thumb = match state.storage.head_object(&thumb_key).await {
        Ok(Some(remote)) if remote.sha256.is_some() => Some(ThumbnailArtifact {
            byte_size: remote.byte_size,
            storage_key: thumb_key.clone(),
            checksum: remote.sha256.unwrap_or_default(),
            local_path: None,
        }),
        _ => None,
    };

    let encode_futs = pending.iter().map(|(level, key)| {
        encoder.encode_rendition(&source_path, work_dir.path(), key.clone(), *level, cancel)
    });
    let thumb_fut = async {
        match reused_thumb {
            Some(t) => Ok(t),
            None => {
                encoder
                    .extract_thumbnail(
                        &source_path,
                        work_dir.path(),
                        thumb_key.clone(),
                        probe.duration_seconds,
                        cancel,
                    )
                    .await
            }
        }
    };

    // Barrier: the job leaves Encoding only when every task has reported.
    let (encode_results, thumb_result) = tokio::join!(join_all(encode_futs), thumb_fut);

    let mut first_err: Option<PipelineError> = None;
    for result in encode_results {
        match result {
            Ok(artifact) => completed.push(artifact),
            Err(e) => {
                error!(job = %job.id, "Rendition failed: {}", e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    let thumbnail = match thumb_result {
        Ok(t) => Some(t),
        Err(e) => {
            error!(job = %job.id, "Thumbnail failed: {}", e);
            if first_err.is_none() {
                first_err = Some(e);
            }
            None
        }
    };

    let upload_retry = RetryPolicy::new(config.upload_attempts, RETRY_BACKOFF);
    let upload_deadline = Duration::from_secs(config.upload_timeout_secs);
    let publisher = Publisher::new(&state.storage, upload_retry, upload_deadline);

    if let Some(err) = first_err {
        // Keep what finished so an operator retry resumes by key instead of
        // re-encoding. Cancelled jobs skip this; their keys are left for GC.
        if !matches!(err, PipelineError::Cancelled) {
            publisher.retain(&completed, thumbnail.as_ref()).await;
        }
        return Err(err);
    }
    let thumbnail = thumbnail.ok_or_else(|| {
        PipelineError::Internal(anyhow!("thumbnail missing without a recorded failure"))
    })?;

    let missing = missing_artifacts(&plan, &completed);
    if let Some(quality) = missing.first() {
        return Err(PipelineError::Encoding {
            quality: *quality,
            source: anyhow!("artifact missing after encode stage"),
        });
    }
    // Manifest and catalog order is the plan order, highest first.
    let ordered: Vec<RenditionArtifact> = plan
        .levels()
        .iter()
        .filter_map(|level| completed.iter().find(|a| a.quality == level.label).cloned())
        .collect();

    // --- Publishing ---
    JobRepository::transition(db, &job.id, JobStatus::Encoding, JobStatus::Publishing)
        .await
        .map_err(PipelineError::Internal)?;

    let locators = publisher.publish(&prefix, &ordered, &thumbnail, cancel).await?;

    // --- Committing ---
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    JobRepository::transition(db, &job.id, JobStatus::Publishing, JobStatus::Committing)
        .await
        .map_err(PipelineError::Internal)?;

    let total_bytes: u64 = ordered.iter().map(|a| a.byte_size).sum();
    let fields = EpisodeMediaFields {
        video_url: locators.video_url.clone(),
        thumbnail_url: locators.thumbnail_url.clone(),
        duration_seconds: probe.duration_seconds.round() as i32,
        file_size_bytes: total_bytes as i64,
        qualities: plan.labels(),
    };

    match CatalogRepository::publish_episode(db, &job.metadata.episode_id, &fields).await {
        Ok(true) => {}
        Ok(false) => return Err(PipelineError::EpisodeNotFound(job.metadata.episode_id.clone())),
        Err(e) => return Err(PipelineError::Commit(e)),
    }

    JobRepository::transition(db, &job.id, JobStatus::Committing, JobStatus::Completed)
        .await
        .map_err(PipelineError::Internal)?;

    info!(job = %job.id, episode = %job.metadata.episode_id, "✅ Job completed");

    Ok(PipelineOutcome {
        locators,
        qualities: plan.labels(),
        duration_seconds: probe.duration_seconds,
        total_bytes,
    })
}
