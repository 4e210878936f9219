use serde::Serialize;

/// Everything the pipeline is allowed to write into an episode row: the
/// published locators plus metadata derived from the source and the encodes.
/// The row is touched exactly once per job, with all fields in one statement.
#[derive(Debug, Serialize, Clone)]
pub struct EpisodeMediaFields {
    pub video_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: i32,
    pub file_size_bytes: i64,
    pub qualities: Vec<String>,
}
