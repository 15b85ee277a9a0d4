use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{
    page, Announcement, AnnouncementAudience, AnnouncementQuery, CreateAnnouncementRequest,
    UpdateAnnouncementRequest,
};

#[derive(Debug, Clone)]
pub struct AnnouncementService {
    db: PgPool,
}

impl AnnouncementService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_announcement(
        &self,
        gym_id: Uuid,
        author_id: Uuid,
        request: CreateAnnouncementRequest,
    ) -> AppResult<Announcement> {
        let announcement = sqlx::query_as::<_, Announcement>(
            r#"
            INSERT INTO announcements (id, gym_id, author_id, title, body, audience, is_pinned, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gym_id)
        .bind(author_id)
        .bind(request.title.trim())
        .bind(&request.body)
        .bind(request.audience.unwrap_or(AnnouncementAudience::All))
        .bind(request.is_pinned)
        .bind(request.expires_at)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(announcement_id = %announcement.id, %gym_id, "published announcement");
        Ok(announcement)
    }

    /// An announcement of `gym_id` that `reader` is allowed to see.
    pub async fn get_announcement(
        &self,
        gym_id: Uuid,
        announcement_id: Uuid,
        reader: UserRole,
    ) -> AppResult<Announcement> {
        let announcement = sqlx::query_as::<_, Announcement>(
            "SELECT * FROM announcements WHERE id = $1 AND gym_id = $2",
        )
        .bind(announcement_id)
        .bind(gym_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Announcement"))?;

        match AnnouncementAudience::visible_to(reader) {
            Some(audiences) if !audiences.contains(&announcement.audience) => {
                Err(AppError::not_found("Announcement"))
            }
            _ => Ok(announcement),
        }
    }

    /// Announcements visible to `reader`, pinned first and newest first.
    pub async fn list_announcements(
        &self,
        gym_id: Uuid,
        reader: UserRole,
        query: &AnnouncementQuery,
    ) -> AppResult<Vec<Announcement>> {
        let (limit, offset) = page(query.limit, query.offset);
        let visible: Option<Vec<String>> = AnnouncementAudience::visible_to(reader)
            .map(|audiences| audiences.iter().map(|a| a.as_str().to_string()).collect());

        let announcements = sqlx::query_as::<_, Announcement>(
            r#"
            SELECT * FROM announcements
            WHERE gym_id = $1
              AND ($2::text[] IS NULL OR audience::text = ANY($2))
              AND ($3::announcement_audience IS NULL OR audience = $3)
              AND ($4 OR expires_at IS NULL OR expires_at > NOW())
            ORDER BY is_pinned DESC, published_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(gym_id)
        .bind(visible)
        .bind(query.audience)
        .bind(query.include_expired.unwrap_or(false))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(announcements)
    }

    pub async fn update_announcement(
        &self,
        gym_id: Uuid,
        announcement_id: Uuid,
        request: UpdateAnnouncementRequest,
    ) -> AppResult<Announcement> {
        sqlx::query_as::<_, Announcement>(
            r#"
            UPDATE announcements
            SET title = COALESCE($3, title),
                body = COALESCE($4, body),
                audience = COALESCE($5, audience),
                is_pinned = COALESCE($6, is_pinned),
                expires_at = COALESCE($7, expires_at),
                updated_at = NOW()
            WHERE id = $1 AND gym_id = $2
            RETURNING *
            "#,
        )
        .bind(announcement_id)
        .bind(gym_id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(&request.body)
        .bind(request.audience)
        .bind(request.is_pinned)
        .bind(request.expires_at)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Announcement"))
    }

    pub async fn delete_announcement(&self, gym_id: Uuid, announcement_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1 AND gym_id = $2")
            .bind(announcement_id)
            .bind(gym_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Announcement"));
        }

        Ok(())
    }
}
