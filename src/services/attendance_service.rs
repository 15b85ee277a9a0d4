use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{page, Attendance, AttendanceFilter};
use crate::services::{MembershipService, UserService};

/// Gym visits: check-ins, check-outs and their history.
#[derive(Debug, Clone)]
pub struct AttendanceService {
    db: PgPool,
    users: UserService,
    memberships: MembershipService,
}

impl AttendanceService {
    pub fn new(db: PgPool) -> Self {
        Self {
            users: UserService::new(db.clone()),
            memberships: MembershipService::new(db.clone()),
            db,
        }
    }

    /// Open a visit for `user_id`. Members need a membership covering `today`;
    /// employees of the gym can always check in.
    pub async fn check_in(
        &self,
        gym_id: Uuid,
        user_id: Uuid,
        recorded_by: Option<Uuid>,
        today: NaiveDate,
    ) -> AppResult<Attendance> {
        let visitor = self
            .users
            .get_gym_user(
                gym_id,
                user_id,
                &[UserRole::Member, UserRole::Staff, UserRole::Trainer],
            )
            .await?;

        if !visitor.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        if visitor.role == UserRole::Member
            && self
                .memberships
                .active_membership_for(visitor.id, gym_id, today)
                .await?
                .is_none()
        {
            return Err(AppError::Forbidden(
                "No active membership covers today".to_string(),
            ));
        }

        if self.open_visit(visitor.id).await?.is_some() {
            return Err(AppError::AlreadyExists("Open check-in".to_string()));
        }

        // the partial unique index still guards concurrent check-ins
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance (id, gym_id, user_id, recorded_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gym_id)
        .bind(visitor.id)
        .bind(recorded_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(attendance_id = %attendance.id, %user_id, %gym_id, "checked in");
        Ok(attendance)
    }

    pub async fn check_out(&self, gym_id: Uuid, attendance_id: Uuid) -> AppResult<Attendance> {
        let closed = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendance SET check_out_at = NOW()
            WHERE id = $1 AND gym_id = $2 AND check_out_at IS NULL
            RETURNING *
            "#,
        )
        .bind(attendance_id)
        .bind(gym_id)
        .fetch_optional(&self.db)
        .await?;

        if let Some(attendance) = closed {
            tracing::info!(%attendance_id, user_id = %attendance.user_id, "checked out");
            return Ok(attendance);
        }

        self.get_attendance(gym_id, attendance_id).await?;
        Err(AppError::BadRequest("Already checked out".to_string()))
    }

    /// Close the open visit of `user_id`, wherever it was opened in this gym.
    pub async fn check_out_open(&self, gym_id: Uuid, user_id: Uuid) -> AppResult<Attendance> {
        let visit = self
            .open_visit(user_id)
            .await?
            .filter(|visit| visit.gym_id == gym_id)
            .ok_or_else(|| AppError::not_found("Open check-in"))?;

        self.check_out(gym_id, visit.id).await
    }

    pub async fn get_attendance(&self, gym_id: Uuid, attendance_id: Uuid) -> AppResult<Attendance> {
        sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = $1 AND gym_id = $2")
            .bind(attendance_id)
            .bind(gym_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Attendance record"))
    }

    pub async fn list_attendance(&self, gym_id: Uuid, filter: &AttendanceFilter) -> AppResult<Vec<Attendance>> {
        let (limit, offset) = page(filter.limit, filter.offset);

        let records = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE gym_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::date IS NULL OR check_in_at::date >= $3)
              AND ($4::date IS NULL OR check_in_at::date <= $4)
              AND (NOT $5 OR check_out_at IS NULL)
            ORDER BY check_in_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(gym_id)
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.open_only.unwrap_or(false))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    async fn open_visit(&self, user_id: Uuid) -> AppResult<Option<Attendance>> {
        let visit = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE user_id = $1 AND check_out_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(visit)
    }
}
