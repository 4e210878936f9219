use super::model::{JobStatus, TranscodeJob};
use anyhow::{anyhow, Result};
use sqlx::PgPool;

pub struct JobRepository;

impl JobRepository {
    /// Insert the job in `Received` state. Single statement, so a job is
    /// either fully persisted or absent.
    pub async fn create(pool: &PgPool, job: &TranscodeJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transcode_jobs
                (id, show_id, episode_id, title, description,
                 season_number, episode_number, is_premium, is_trailer,
                 source_ref, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            "#,
        )
        .bind(&job.id)
        .bind(&job.metadata.show_id)
        .bind(&job.metadata.episode_id)
        .bind(&job.metadata.title)
        .bind(&job.metadata.description)
        .bind(job.metadata.season_number)
        .bind(job.metadata.episode_number)
        .bind(job.metadata.is_premium)
        .bind(job.metadata.is_trailer)
        .bind(&job.source_ref)
        .bind(job.status.as_str())
        .bind(job.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Compare-and-set status update. The WHERE clause carries the expected
    /// current status, so concurrent retries of the same job cannot push it
    /// backwards.
    pub async fn transition(
        pool: &PgPool,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<()> {
        if !from.can_transition(to) {
            return Err(anyhow!(
                "illegal job transition {} -> {}",
                from.as_str(),
                to.as_str()
            ));
        }

        let result = sqlx::query(
            "UPDATE transcode_jobs SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(job_id)
        .bind(from.as_str())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!(
                "job {} was not in {} when moving to {}",
                job_id,
                from.as_str(),
                to.as_str()
            ));
        }

        Ok(())
    }

    /// Terminal failure from whatever live state the job is in. Completed
    /// and already-failed jobs are left alone.
    pub async fn mark_failed(pool: &PgPool, job_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE transcode_jobs SET status = 'FAILED', updated_at = NOW()
             WHERE id = $1 AND status NOT IN ('COMPLETED', 'FAILED')",
        )
        .bind(job_id)
        .execute(pool)
        .await?;

        Ok(())
    }
}
