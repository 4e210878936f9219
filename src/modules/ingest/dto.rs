use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::modules::jobs::model::VideoMetadata;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadVideoRequest {
    /// Base64-encoded payload or a fetchable http(s) URL.
    pub video_file: String,
    pub metadata: UploadMetadata,
}

#[derive(Debug, Deserialize, Validate, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    #[validate(length(min = 1, message = "showId is required"))]
    pub show_id: String,
    #[validate(length(min = 1, message = "episodeId is required"))]
    pub episode_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "seasonNumber must be >= 0"))]
    pub season_number: i32,
    #[validate(range(min = 1, message = "episodeNumber must be >= 1"))]
    pub episode_number: i32,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_trailer: bool,
}

impl From<UploadMetadata> for VideoMetadata {
    fn from(dto: UploadMetadata) -> Self {
        VideoMetadata {
            show_id: dto.show_id,
            episode_id: dto.episode_id,
            title: dto.title,
            description: dto.description,
            season_number: dto.season_number,
            episode_number: dto.episode_number,
            is_premium: dto.is_premium,
            is_trailer: dto.is_trailer,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadVideoResponse {
    pub success: bool,
    pub video_url: String,
    pub thumbnail_url: String,
    pub qualities: Vec<String>,
}

/// Flatten validator output into one caller-facing line, preferring the
/// messages declared on the fields above.
pub fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = Vec::new();
    for (field, kinds) in errors.errors() {
        if let validator::ValidationErrorsKind::Field(field_errors) = kinds {
            for err in field_errors {
                match &err.message {
                    Some(msg) => messages.push(msg.to_string()),
                    None => messages.push(format!("{} is invalid", field)),
                }
            }
        }
    }
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> serde_json::Value {
        json!({
            "videoFile": "https://cdn.example.com/raw.mkv",
            "metadata": {
                "showId": "s1",
                "episodeId": "e1",
                "title": "Pilot",
                "description": "First episode",
                "seasonNumber": 1,
                "episodeNumber": 1,
                "isPremium": true,
                "isTrailer": false
            }
        })
    }

    #[test]
    fn accepts_a_complete_request() {
        let req: UploadVideoRequest = serde_json::from_value(valid_body()).unwrap();
        assert_eq!(req.metadata.show_id, "s1");
        assert_eq!(req.metadata.episode_id, "e1");
        assert!(req.metadata.is_premium);
        assert!(req.metadata.validate().is_ok());
    }

    #[test]
    fn missing_episode_id_is_rejected_at_deserialization() {
        let mut body = valid_body();
        body["metadata"].as_object_mut().unwrap().remove("episodeId");
        let err = serde_json::from_value::<UploadVideoRequest>(body).unwrap_err();
        assert!(err.to_string().contains("episodeId"));
    }

    #[test]
    fn empty_ids_and_bad_numbers_fail_validation() {
        let mut body = valid_body();
        body["metadata"]["episodeId"] = json!("");
        body["metadata"]["seasonNumber"] = json!(-1);
        body["metadata"]["episodeNumber"] = json!(0);

        let req: UploadVideoRequest = serde_json::from_value(body).unwrap();
        let errors = req.metadata.validate().unwrap_err();
        let message = validation_message(&errors);

        assert!(message.contains("episodeId is required"));
        assert!(message.contains("seasonNumber must be >= 0"));
        assert!(message.contains("episodeNumber must be >= 1"));
    }

    #[test]
    fn season_zero_is_allowed_for_specials() {
        let mut body = valid_body();
        body["metadata"]["seasonNumber"] = json!(0);
        let req: UploadVideoRequest = serde_json::from_value(body).unwrap();
        assert!(req.metadata.validate().is_ok());
    }

    #[test]
    fn response_serializes_with_wire_field_names() {
        let res = UploadVideoResponse {
            success: true,
            video_url: "https://cdn.example.com/videos/s1/1/1/j/master.m3u8".to_string(),
            thumbnail_url: "https://cdn.example.com/videos/s1/1/1/j/thumbnail.jpg".to_string(),
            qualities: vec!["1080p".to_string(), "720p".to_string()],
        };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["videoUrl"].as_str().unwrap().ends_with("master.m3u8"));
        assert!(json["thumbnailUrl"].as_str().unwrap().ends_with("thumbnail.jpg"));
        assert_eq!(json["qualities"][0], "1080p");
    }
}
