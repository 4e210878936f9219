use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    JwtSecret,
    PublicBaseUrl,
    WorkDir,
    FfmpegPath,
    FfprobePath,
    MaxFfmpegJobs,
    EncodeTimeoutSecs,
    UploadTimeoutSecs,
    EncodeAttempts,
    UploadAttempts,
    TrailerMaxQuality,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::PublicBaseUrl => "PUBLIC_BASE_URL",
            EnvKey::WorkDir => "TRANSCODE_WORK_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::MaxFfmpegJobs => "MAX_FFMPEG_JOBS",
            EnvKey::EncodeTimeoutSecs => "ENCODE_TIMEOUT_SECS",
            EnvKey::UploadTimeoutSecs => "UPLOAD_TIMEOUT_SECS",
            EnvKey::EncodeAttempts => "ENCODE_ATTEMPTS",
            EnvKey::UploadAttempts => "UPLOAD_ATTEMPTS",
            EnvKey::TrailerMaxQuality => "TRAILER_MAX_QUALITY",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok()
}
