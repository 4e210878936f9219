use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub jwt_secret: String,
    pub public_base_url: String,
    pub work_dir: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub max_ffmpeg_jobs: usize,
    pub encode_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub encode_attempts: u32,
    pub upload_attempts: u32,
    /// Optional ladder cap for trailers, e.g. "720p". Unset means trailers
    /// get the full ladder.
    pub trailer_max_quality: Option<String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_bucket: env::get(EnvKey::MinioBucket)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            jwt_secret: env::get(EnvKey::JwtSecret)?,
            public_base_url: env::get(EnvKey::PublicBaseUrl)?,
            work_dir: env::get_or(EnvKey::WorkDir, "/tmp/vod-ingest"),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe"),
            max_ffmpeg_jobs: env::get_parsed(EnvKey::MaxFfmpegJobs, 4),
            encode_timeout_secs: env::get_parsed(EnvKey::EncodeTimeoutSecs, 1800),
            upload_timeout_secs: env::get_parsed(EnvKey::UploadTimeoutSecs, 300),
            encode_attempts: env::get_parsed(EnvKey::EncodeAttempts, 3),
            upload_attempts: env::get_parsed(EnvKey::UploadAttempts, 3),
            trailer_max_quality: env::get_opt(EnvKey::TrailerMaxQuality),
        })
    }
}
