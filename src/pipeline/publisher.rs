use anyhow::{anyhow, Context};
use futures_util::future::try_join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::encoder::{RenditionArtifact, ThumbnailArtifact};
use super::error::PipelineError;
use super::manifest;
use super::planner::RenditionPlan;
use super::retry::{retry_async, RetryPolicy};
use crate::infrastructure::storage::s3::StorageService;

pub const MANIFEST_FILE: &str = "master.m3u8";
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";
const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

pub fn rendition_key(prefix: &str, quality: &str) -> String {
    format!("{}{}.mp4", prefix, quality)
}

pub fn thumbnail_key(prefix: &str) -> String {
    format!("{}{}", prefix, THUMBNAIL_FILE)
}

pub fn manifest_key(prefix: &str) -> String {
    format!("{}{}", prefix, MANIFEST_FILE)
}

/// Public-facing locators for a fully published job. The playback URL is the
/// manifest: that is what players consume for adaptive streaming.
#[derive(Debug, Clone)]
pub struct PublishedLocators {
    pub video_url: String,
    pub thumbnail_url: String,
    pub manifest_url: String,
}

/// Qualities the plan names that have no corresponding artifact. Must be
/// empty before the job is allowed anywhere near the catalog.
pub fn missing_artifacts(
    plan: &RenditionPlan,
    renditions: &[RenditionArtifact],
) -> Vec<&'static str> {
    plan.levels()
        .iter()
        .filter(|level| !renditions.iter().any(|r| r.quality == level.label))
        .map(|level| level.label)
        .collect()
}

pub struct Publisher<'a> {
    storage: &'a StorageService,
    retry: RetryPolicy,
    deadline: Duration,
}

impl<'a> Publisher<'a> {
    pub fn new(storage: &'a StorageService, retry: RetryPolicy, deadline: Duration) -> Self {
        Self {
            storage,
            retry,
            deadline,
        }
    }

    /// Upload every artifact, join, then build and upload the manifest.
    /// Keys are deterministic per job, so re-running publish for the same
    /// job overwrites the same objects and returns the same locators.
    pub async fn publish(
        &self,
        prefix: &str,
        renditions: &[RenditionArtifact],
        thumbnail: &ThumbnailArtifact,
        cancel: &CancellationToken,
    ) -> Result<PublishedLocators, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut uploads = Vec::new();
        for artifact in renditions {
            if let Some(path) = &artifact.local_path {
                uploads.push(self.upload_file(
                    artifact.storage_key.clone(),
                    path.clone(),
                    artifact.checksum.clone(),
                ));
            }
        }
        if let Some(path) = &thumbnail.local_path {
            uploads.push(self.upload_file(
                thumbnail.storage_key.clone(),
                path.clone(),
                thumbnail.checksum.clone(),
            ));
        }

        let joined = try_join_all(uploads);
        tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = joined => { result?; }
        }

        // Every rendition and the thumbnail are durable; only now does the
        // manifest come into existence.
        let playlist = manifest::build_master_playlist(renditions);
        let m_key = manifest_key(prefix);

        retry_async(self.retry, MANIFEST_FILE, |_| async {
            self.storage
                .put_object(
                    &m_key,
                    bytes::Bytes::from(playlist.clone()),
                    MANIFEST_CONTENT_TYPE,
                    None,
                )
                .await
                .map_err(|e| anyhow!(e))
        })
        .await
        .map_err(|e| PipelineError::Publish {
            artifact: m_key.clone(),
            source: e,
        })?;

        info!("📤 Published {} artifacts under {}", renditions.len() + 2, prefix);

        let manifest_url = self.storage.public_url(&m_key);
        Ok(PublishedLocators {
            video_url: manifest_url.clone(),
            thumbnail_url: self.storage.public_url(&thumbnail.storage_key),
            manifest_url,
        })
    }

    /// Best-effort upload of artifacts that finished before the job failed,
    /// so a retry of the same job can reuse them by key. No manifest is
    /// written; upload failures here are logged and swallowed.
    pub async fn retain(&self, renditions: &[RenditionArtifact], thumbnail: Option<&ThumbnailArtifact>) {
        for artifact in renditions {
            if let Some(path) = &artifact.local_path {
                if let Err(e) = self
                    .upload_file(
                        artifact.storage_key.clone(),
                        path.clone(),
                        artifact.checksum.clone(),
                    )
                    .await
                {
                    warn!("Could not retain {}: {}", artifact.storage_key, e);
                }
            }
        }
        if let Some(thumb) = thumbnail {
            if let Some(path) = &thumb.local_path {
                if let Err(e) = self
                    .upload_file(thumb.storage_key.clone(), path.clone(), thumb.checksum.clone())
                    .await
                {
                    warn!("Could not retain {}: {}", thumb.storage_key, e);
                }
            }
        }
    }

    async fn upload_file(
        &self,
        key: String,
        path: std::path::PathBuf,
        checksum: String,
    ) -> Result<(), PipelineError> {
        let content_type = mime_guess::from_path(&key)
            .first_or_octet_stream()
            .to_string();

        retry_async(self.retry, &key, |_| {
            let key = key.clone();
            let path = path.clone();
            let content_type = content_type.clone();
            let checksum = checksum.clone();
            async move {
                tokio::time::timeout(
                    self.deadline,
                    self.storage.put_file(&key, &path, &content_type, &checksum),
                )
                .await
                .map_err(|_| anyhow!("upload exceeded the {}s deadline", self.deadline.as_secs()))?
                .with_context(|| format!("upload of {} failed", key))
            }
        })
        .await
        .map_err(|e| PipelineError::Publish {
            artifact: key.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::planner::{plan, PlanPolicy};
    use crate::pipeline::probe::SourceProbe;

    fn probe_1080() -> SourceProbe {
        SourceProbe {
            width: 1920,
            height: 1080,
            duration_seconds: 900.0,
            bit_rate: None,
            codec: "h264".to_string(),
        }
    }

    fn artifact(quality: &'static str, prefix: &str) -> RenditionArtifact {
        RenditionArtifact {
            quality,
            byte_size: 10,
            storage_key: rendition_key(prefix, quality),
            checksum: "00".to_string(),
            local_path: None,
        }
    }

    #[test]
    fn keys_are_deterministic_per_job_prefix() {
        let prefix = "s1/1/1/1754500000000-abcd1234/";
        assert_eq!(
            rendition_key(prefix, "1080p"),
            "s1/1/1/1754500000000-abcd1234/1080p.mp4"
        );
        assert_eq!(
            thumbnail_key(prefix),
            "s1/1/1/1754500000000-abcd1234/thumbnail.jpg"
        );
        assert_eq!(
            manifest_key(prefix),
            "s1/1/1/1754500000000-abcd1234/master.m3u8"
        );
        // Same inputs, same keys: republish overwrites rather than duplicates.
        assert_eq!(rendition_key(prefix, "1080p"), rendition_key(prefix, "1080p"));
    }

    #[test]
    fn complete_artifact_sets_pass_the_commit_gate() {
        let p = plan(&probe_1080(), &PlanPolicy::default());
        let prefix = "s1/1/1/j/";
        let renditions: Vec<_> = ["1080p", "720p", "480p", "360p"]
            .into_iter()
            .map(|q| artifact(q, prefix))
            .collect();
        assert!(missing_artifacts(&p, &renditions).is_empty());
    }

    #[test]
    fn a_missing_rendition_blocks_the_commit_gate() {
        let p = plan(&probe_1080(), &PlanPolicy::default());
        let prefix = "s1/1/1/j/";
        let renditions = vec![
            artifact("1080p", prefix),
            artifact("720p", prefix),
            artifact("360p", prefix),
        ];
        assert_eq!(missing_artifacts(&p, &renditions), vec!["480p"]);
    }

    #[tokio::test]
    async fn locators_follow_the_base_bucket_key_convention() {
        let storage = StorageService::new(
            "http://localhost:9000",
            "videos",
            "minioadmin",
            "minioadmin",
            "https://cdn.example.com/",
        )
        .await;

        assert_eq!(
            storage.public_url("s1/1/1/j/master.m3u8"),
            "https://cdn.example.com/videos/s1/1/1/j/master.m3u8"
        );
    }
}
