use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lifecycle of one ingestion job. Transitions only move forward along the
/// pipeline, except that any live job can fail and a failed job can be
/// re-entered at `Received` by an operator retry.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Received,
    Planning,
    Encoding,
    Publishing,
    Committing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Received => "RECEIVED",
            JobStatus::Planning => "PLANNING",
            JobStatus::Encoding => "ENCODING",
            JobStatus::Publishing => "PUBLISHING",
            JobStatus::Committing => "COMMITTING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn step(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Received => Some(JobStatus::Planning),
            JobStatus::Planning => Some(JobStatus::Encoding),
            JobStatus::Encoding => Some(JobStatus::Publishing),
            JobStatus::Publishing => Some(JobStatus::Committing),
            JobStatus::Committing => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    pub fn can_transition(&self, next: JobStatus) -> bool {
        if next == JobStatus::Failed {
            return !self.is_terminal();
        }
        // Operator retry re-enters the pipeline with the same job id.
        if *self == JobStatus::Failed {
            return next == JobStatus::Received;
        }
        self.step() == Some(next)
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PLANNING" => JobStatus::Planning,
            "ENCODING" => JobStatus::Encoding,
            "PUBLISHING" => JobStatus::Publishing,
            "COMMITTING" => JobStatus::Committing,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Received,
        }
    }
}

/// Descriptive metadata attached to an upload, as validated at the edge.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoMetadata {
    pub show_id: String,
    pub episode_id: String,
    pub title: String,
    pub description: String,
    pub season_number: i32,
    pub episode_number: i32,
    pub is_premium: bool,
    pub is_trailer: bool,
}

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub id: String,
    pub metadata: VideoMetadata,
    /// Either a fetchable http(s) URL or the storage key the inline payload
    /// was spilled to.
    pub source_ref: String,
    pub status: JobStatus,
    pub created_at: OffsetDateTime,
}

impl TranscodeJob {
    /// Destination prefix exclusive to this job. Two jobs never share one,
    /// so concurrent jobs cannot contend on storage keys.
    pub fn key_prefix(&self) -> String {
        format!(
            "{}/{}/{}/{}/",
            self.metadata.show_id,
            self.metadata.season_number,
            self.metadata.episode_number,
            self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(metadata: VideoMetadata) -> TranscodeJob {
        TranscodeJob {
            id: "1754500000000-abcd1234".to_string(),
            metadata,
            source_ref: "https://example.com/source.mp4".to_string(),
            status: JobStatus::Received,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn statuses_advance_along_the_pipeline_only() {
        use JobStatus::*;
        assert!(Received.can_transition(Planning));
        assert!(Planning.can_transition(Encoding));
        assert!(Encoding.can_transition(Publishing));
        assert!(Publishing.can_transition(Committing));
        assert!(Committing.can_transition(Completed));

        // No skipping, no going back.
        assert!(!Received.can_transition(Encoding));
        assert!(!Publishing.can_transition(Encoding));
        assert!(!Completed.can_transition(Received));
    }

    #[test]
    fn any_live_status_can_fail_and_completed_cannot() {
        use JobStatus::*;
        for s in [Received, Planning, Encoding, Publishing, Committing] {
            assert!(s.can_transition(Failed), "{:?} should be able to fail", s);
        }
        assert!(!Completed.can_transition(Failed));
        assert!(!Failed.can_transition(Failed));
    }

    #[test]
    fn failed_jobs_re_enter_at_received_only() {
        use JobStatus::*;
        assert!(Failed.can_transition(Received));
        assert!(!Failed.can_transition(Encoding));
        assert!(!Failed.can_transition(Completed));
    }

    #[test]
    fn key_prefix_follows_show_season_episode_job() {
        let j = job(VideoMetadata {
            show_id: "s1".to_string(),
            episode_id: "e1".to_string(),
            title: "Pilot".to_string(),
            description: String::new(),
            season_number: 1,
            episode_number: 1,
            is_premium: false,
            is_trailer: false,
        });
        assert_eq!(j.key_prefix(), "s1/1/1/1754500000000-abcd1234/");
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        use JobStatus::*;
        for s in [Received, Planning, Encoding, Publishing, Committing, Completed, Failed] {
            assert_eq!(JobStatus::from(s.as_str().to_string()), s);
        }
    }
}
