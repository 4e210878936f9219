use aws_sdk_s3::config::Builder;
use aws_sdk_s3::{config::BehaviorVersion, config::Credentials, config::Region, Client};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::info;

// Minimum part size for S3 is 5MB. We use 6MB to be safe.
const PART_SIZE: usize = 6 * 1024 * 1024;
// Single put_object below this, multipart above.
const MULTIPART_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Metadata key under which artifact checksums are stored, so a later job
/// retry can recognize an already-published artifact.
const CHECKSUM_META_KEY: &str = "sha256";

/// What a HEAD on an existing key tells us.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub byte_size: u64,
    pub sha256: Option<String>,
}

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    public_base_url: String,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        Self {
            client,
            bucket: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public locator convention: `{base_url}/{bucket}/{key}`.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    pub async fn put_object(
        &self,
        key: &str,
        body: bytes::Bytes,
        content_type: &str,
        checksum: Option<&str>,
    ) -> Result<(), aws_sdk_s3::Error> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(body));

        if let Some(sum) = checksum {
            req = req.metadata(CHECKSUM_META_KEY, sum);
        }

        req.send().await?;
        Ok(())
    }

    /// Upload a local file, using multipart for large files. Overwrites the
    /// key if it already exists, which is what makes republish idempotent.
    pub async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        checksum: &str,
    ) -> Result<(), anyhow::Error> {
        let size = tokio::fs::metadata(path).await?.len();

        if size < MULTIPART_THRESHOLD {
            let body = aws_sdk_s3::primitives::ByteStream::from_path(path).await?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .metadata(CHECKSUM_META_KEY, checksum)
                .body(body)
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;
            return Ok(());
        }

        let upload_id = self.create_multipart_upload(key, content_type, checksum).await?;

        match self.upload_file_parts(key, &upload_id, path).await {
            Ok(parts) => {
                self.complete_multipart_upload(key, &upload_id, parts).await?;
                Ok(())
            }
            Err(e) => {
                // Leave no dangling upload behind.
                let _ = self.abort_multipart_upload(key, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn upload_file_parts(
        &self,
        key: &str,
        upload_id: &str,
        path: &Path,
    ) -> Result<Vec<aws_sdk_s3::types::CompletedPart>, anyhow::Error> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut parts = Vec::new();
        let mut part_number = 1;

        loop {
            let mut buffer = Vec::with_capacity(PART_SIZE);
            let read = (&mut file)
                .take(PART_SIZE as u64)
                .read_to_end(&mut buffer)
                .await?;
            if read == 0 {
                break;
            }

            let part = self
                .upload_part(key, upload_id, part_number, bytes::Bytes::from(buffer))
                .await?;
            parts.push(part);
            part_number += 1;
        }

        Ok(parts)
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        checksum: &str,
    ) -> Result<String, aws_sdk_s3::Error> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .metadata(CHECKSUM_META_KEY, checksum)
            .send()
            .await?;

        Ok(result.upload_id.unwrap_or_default())
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: bytes::Bytes,
    ) -> Result<aws_sdk_s3::types::CompletedPart, aws_sdk_s3::Error> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await?;

        Ok(aws_sdk_s3::types::CompletedPart::builder()
            .set_e_tag(result.e_tag)
            .part_number(part_number)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<aws_sdk_s3::types::CompletedPart>,
    ) -> Result<(), aws_sdk_s3::Error> {
        let completed = aws_sdk_s3::types::CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await?;

        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<(), aws_sdk_s3::Error> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await?;

        Ok(())
    }

    /// HEAD a key; `None` if it does not exist.
    pub async fn head_object(&self, key: &str) -> Result<Option<RemoteObject>, aws_sdk_s3::Error> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => Ok(Some(RemoteObject {
                byte_size: head.content_length().unwrap_or(0) as u64,
                sha256: head
                    .metadata()
                    .and_then(|m| m.get(CHECKSUM_META_KEY))
                    .cloned(),
            })),
            Err(e) => match aws_sdk_s3::Error::from(e) {
                aws_sdk_s3::Error::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    /// Stream an object into a local file.
    pub async fn download_to_file(&self, key: &str, dest: &Path) -> Result<u64, anyhow::Error> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        let mut reader = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        Ok(written)
    }
}
