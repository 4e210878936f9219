use anyhow::{anyhow, Context, Result};
use base64::Engine;
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;
use url::Url;

use super::error::PipelineError;
use crate::infrastructure::storage::s3::StorageService;

/// A source reference as it arrives at the edge: either something we can
/// fetch later, or bytes carried inline in the request.
#[derive(Debug)]
pub enum IncomingSource {
    Url(Url),
    Inline(bytes::Bytes),
}

/// Decide what kind of source the request carries. Inline payloads are
/// decoded here so a bad reference is rejected before any job exists.
pub fn classify(video_file: &str) -> Result<IncomingSource, PipelineError> {
    let trimmed = video_file.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Validation("videoFile is required".to_string()));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let url = Url::parse(trimmed).map_err(|_| {
            PipelineError::Validation("videoFile is not a valid URL".to_string())
        })?;
        return Ok(IncomingSource::Url(url));
    }

    // Inline payload, optionally wrapped as a data URI.
    let encoded = match trimmed.find(";base64,") {
        Some(idx) => &trimmed[idx + ";base64,".len()..],
        None => trimmed,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| {
            PipelineError::Validation(
                "videoFile must be a fetchable URL or a base64 payload".to_string(),
            )
        })?;

    if bytes.is_empty() {
        return Err(PipelineError::Validation("videoFile payload is empty".to_string()));
    }

    Ok(IncomingSource::Inline(bytes::Bytes::from(bytes)))
}

pub struct SourceResolver<'a> {
    pub http: &'a reqwest::Client,
    pub storage: &'a StorageService,
}

impl SourceResolver<'_> {
    /// Materialize the stored source reference as a local file the encoder
    /// can read. URL references are fetched; everything else is a storage
    /// key the inline payload was spilled to at receipt.
    pub async fn fetch(&self, source_ref: &str, dest: &Path) -> Result<u64> {
        if source_ref.starts_with("http://") || source_ref.starts_with("https://") {
            self.fetch_url(source_ref, dest).await
        } else {
            let written = self
                .storage
                .download_to_file(source_ref, dest)
                .await
                .with_context(|| format!("Failed to download spilled source {}", source_ref))?;
            Ok(written)
        }
    }

    async fn fetch_url(&self, url: &str, dest: &Path) -> Result<u64> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Source fetch failed")?
            .error_for_status()
            .context("Source fetch returned an error status")?;

        if let Some(content_type) = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok())
        {
            // text/* and image/* are certainly not video containers.
            if content_type.type_() == mime::TEXT || content_type.type_() == mime::IMAGE {
                return Err(anyhow!("source URL returned {}", content_type));
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Source download interrupted")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("⬇️ Fetched source ({} bytes) from {}", written, url);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn http_and_https_references_classify_as_urls() {
        for raw in ["https://cdn.example.com/raw.mkv", "http://cdn.example.com/raw.mkv"] {
            match classify(raw).unwrap() {
                IncomingSource::Url(url) => assert_eq!(url.as_str(), raw),
                other => panic!("expected Url, got {:?}", other),
            }
        }
    }

    #[test]
    fn base64_payloads_decode_to_inline_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fake video bytes");
        match classify(&encoded).unwrap() {
            IncomingSource::Inline(bytes) => assert_eq!(&bytes[..], b"fake video bytes"),
            other => panic!("expected Inline, got {:?}", other),
        }
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"x264");
        let uri = format!("data:video/mp4;base64,{}", encoded);
        match classify(&uri).unwrap() {
            IncomingSource::Inline(bytes) => assert_eq!(&bytes[..], b"x264"),
            other => panic!("expected Inline, got {:?}", other),
        }
    }

    #[test]
    fn empty_and_undecodable_references_are_validation_errors() {
        for bad in ["", "   ", "not base64 !!!"] {
            match classify(bad) {
                Err(PipelineError::Validation(_)) => {}
                other => panic!("expected Validation error for {:?}, got {:?}", bad, other),
            }
        }
    }
}
