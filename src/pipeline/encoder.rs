use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::error::PipelineError;
use super::planner::QualityLevel;
use super::retry::{retry_async, RetryPolicy};

/// One encoded quality variant. `local_path` is set until the artifact is
/// durable in object storage; a reused artifact from a previous attempt of
/// the same job never has one.
#[derive(Debug, Clone)]
pub struct RenditionArtifact {
    pub quality: &'static str,
    pub byte_size: u64,
    pub storage_key: String,
    pub checksum: String,
    pub local_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ThumbnailArtifact {
    pub byte_size: u64,
    pub storage_key: String,
    pub checksum: String,
    pub local_path: Option<PathBuf>,
}

pub struct Encoder {
    ffmpeg_path: String,
    retry: RetryPolicy,
    deadline: Duration,
    slots: Arc<Semaphore>,
}

impl Encoder {
    pub fn new(
        ffmpeg_path: &str,
        retry: RetryPolicy,
        deadline: Duration,
        slots: Arc<Semaphore>,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            retry,
            deadline,
            slots,
        }
    }

    /// Encode the source into one target quality. Bounded retry around the
    /// whole ffmpeg run; the deadline applies per attempt. Cancellation kills
    /// the child process and surfaces as `Cancelled`, not as an encode error.
    pub async fn encode_rendition(
        &self,
        input: &Path,
        work_dir: &Path,
        storage_key: String,
        level: &'static QualityLevel,
        cancel: &CancellationToken,
    ) -> Result<RenditionArtifact, PipelineError> {
        let output = work_dir.join(format!("{}.mp4", level.label));
        let args = build_rendition_args(input, &output, level);

        let encode = retry_async(self.retry, level.label, |attempt| {
            let args = args.clone();
            async move {
                // Slot is held only while ffmpeg runs, not across backoff.
                let _permit = self.slots.acquire().await.map_err(|e| anyhow!(e))?;
                if attempt > 1 {
                    info!("🎞️ Re-encoding {} (attempt {})", level.label, attempt);
                }
                self.run_ffmpeg(&args).await
            }
        });

        tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = encode => {
                result.map_err(|e| PipelineError::Encoding {
                    quality: level.label,
                    source: e,
                })?;
            }
        }

        let byte_size = tokio::fs::metadata(&output)
            .await
            .map_err(|e| PipelineError::Encoding {
                quality: level.label,
                source: e.into(),
            })?
            .len();
        let checksum = sha256_file(&output)
            .await
            .map_err(|e| PipelineError::Encoding {
                quality: level.label,
                source: e,
            })?;

        info!("🎞️ Encoded {} ({} bytes)", level.label, byte_size);

        Ok(RenditionArtifact {
            quality: level.label,
            byte_size,
            storage_key,
            checksum,
            local_path: Some(output),
        })
    }

    /// Grab one representative frame at a fixed relative offset into the
    /// source. Independent of the rendition encodes.
    pub async fn extract_thumbnail(
        &self,
        input: &Path,
        work_dir: &Path,
        storage_key: String,
        duration_seconds: f64,
        cancel: &CancellationToken,
    ) -> Result<ThumbnailArtifact, PipelineError> {
        let output = work_dir.join("thumbnail.jpg");
        let offset = thumbnail_offset(duration_seconds);
        let args = build_thumbnail_args(input, &output, offset);

        let extract = retry_async(self.retry, "thumbnail", |_| {
            let args = args.clone();
            async move {
                let _permit = self.slots.acquire().await.map_err(|e| anyhow!(e))?;
                self.run_ffmpeg(&args).await
            }
        });

        tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = extract => {
                result.map_err(|e| PipelineError::Encoding {
                    quality: "thumbnail",
                    source: e,
                })?;
            }
        }

        let byte_size = tokio::fs::metadata(&output)
            .await
            .map_err(|e| PipelineError::Encoding {
                quality: "thumbnail",
                source: e.into(),
            })?
            .len();
        let checksum = sha256_file(&output)
            .await
            .map_err(|e| PipelineError::Encoding {
                quality: "thumbnail",
                source: e,
            })?;

        Ok(ThumbnailArtifact {
            byte_size,
            storage_key,
            checksum,
            local_path: Some(output),
        })
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<()> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.deadline, command.output())
            .await
            .map_err(|_| anyhow!("ffmpeg exceeded the {}s deadline", self.deadline.as_secs()))?
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            ));
        }

        Ok(())
    }
}

fn build_rendition_args(input: &Path, output: &Path, level: &QualityLevel) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        // -2 keeps the width even while preserving aspect ratio.
        "-vf".to_string(),
        format!("scale=-2:{}", level.height),
        "-b:v".to_string(),
        format!("{}k", level.video_kbps),
        "-maxrate".to_string(),
        format!("{}k", level.video_kbps),
        "-bufsize".to_string(),
        format!("{}k", level.video_kbps * 2),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", level.audio_kbps),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

fn build_thumbnail_args(input: &Path, output: &Path, offset_seconds: f64) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        format!("{:.2}", offset_seconds),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        "scale=-2:720".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Frame at 10% into the source.
fn thumbnail_offset(duration_seconds: f64) -> f64 {
    (duration_seconds * 0.10).max(0.0)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim_end();
    match trimmed.char_indices().nth_back(400) {
        Some((idx, _)) => trimmed[idx..].to_string(),
        None => trimmed.to_string(),
    }
}

pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::planner::level_by_label;

    #[test]
    fn rendition_args_scale_and_cap_bitrate_per_level() {
        let level = level_by_label("480p").unwrap();
        let args = build_rendition_args(Path::new("/work/source.bin"), Path::new("/work/480p.mp4"), level);

        assert!(args.contains(&"scale=-2:480".to_string()));
        assert!(args.contains(&"1400k".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "/work/480p.mp4");
    }

    #[test]
    fn thumbnail_seeks_before_decoding() {
        let args = build_thumbnail_args(Path::new("/work/source.bin"), Path::new("/work/thumbnail.jpg"), 132.0);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i);
        assert_eq!(args[ss + 1], "13.20");
    }

    #[test]
    fn thumbnail_offset_is_ten_percent_and_never_negative() {
        assert_eq!(thumbnail_offset(1000.0), 100.0);
        assert_eq!(thumbnail_offset(0.0), 0.0);
        assert_eq!(thumbnail_offset(-5.0), 0.0);
    }

    #[test]
    fn stderr_tail_keeps_only_the_end_of_long_output() {
        let long = format!("{}{}", "x".repeat(2000), "the actual error");
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.len() <= 401);
        assert!(tail.ends_with("the actual error"));
    }

    #[tokio::test]
    async fn sha256_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let digest = sha256_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
