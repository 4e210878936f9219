use super::model::EpisodeMediaFields;
use anyhow::Result;
use sqlx::PgPool;

pub struct CatalogRepository;

impl CatalogRepository {
    /// Conditional single-statement commit. Returns false when the episode
    /// row does not exist, in which case nothing was written at all.
    pub async fn publish_episode(
        pool: &PgPool,
        episode_id: &str,
        fields: &EpisodeMediaFields,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE episodes
            SET video_url = $1,
                thumbnail_url = $2,
                video_duration = $3,
                file_size = $4,
                qualities = $5,
                status = 'published',
                updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&fields.video_url)
        .bind(&fields.thumbnail_url)
        .bind(fields.duration_seconds)
        .bind(fields.file_size_bytes)
        .bind(&fields.qualities)
        .bind(episode_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
