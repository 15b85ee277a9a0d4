use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{
    page, period_end, renewal_start, CreateMembershipRequest, Membership, MembershipFilter,
    MembershipStatus, Plan, UpdateMembershipRequest, User,
};
use crate::services::{PlanService, UserService};

#[derive(Debug, Clone)]
pub struct MembershipService {
    db: PgPool,
    users: UserService,
    plans: PlanService,
}

/// Dates and parties of a membership about to be inserted.
struct NewPeriod {
    user_id: Uuid,
    gym_id: Uuid,
    plan_id: Uuid,
    trainer_id: Option<Uuid>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl MembershipService {
    pub fn new(db: PgPool) -> Self {
        Self {
            users: UserService::new(db.clone()),
            plans: PlanService::new(db.clone()),
            db,
        }
    }

    pub async fn create_membership(
        &self,
        gym_id: Uuid,
        request: CreateMembershipRequest,
        today: NaiveDate,
    ) -> AppResult<Membership> {
        let member = self
            .users
            .get_gym_user(gym_id, request.user_id, &[UserRole::Member])
            .await?;
        let plan = self.sellable_plan(gym_id, request.plan_id).await?;
        let trainer_id = match request.trainer_id {
            Some(trainer_id) => Some(self.gym_trainer(gym_id, trainer_id).await?),
            None => None,
        };

        let start_date = request.start_date.unwrap_or(today);
        let period = NewPeriod {
            user_id: member.id,
            gym_id,
            plan_id: plan.id,
            trainer_id,
            start_date,
            end_date: period_end(start_date, plan.duration_days),
        };

        let mut tx = self.db.begin().await?;
        let membership = insert_period(&mut tx, &period).await?;
        tx.commit().await?;

        tracing::info!(
            membership_id = %membership.id,
            user_id = %membership.user_id,
            %gym_id,
            end = %membership.end_date,
            "created membership"
        );
        Ok(membership)
    }

    /// Memberships of other gyms read as missing.
    pub async fn get_membership(&self, gym_id: Uuid, membership_id: Uuid, today: NaiveDate) -> AppResult<Membership> {
        self.expire_overdue(Some(gym_id), today).await?;

        sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE id = $1 AND gym_id = $2")
            .bind(membership_id)
            .bind(gym_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Membership"))
    }

    pub async fn list_memberships(
        &self,
        gym_id: Uuid,
        filter: &MembershipFilter,
        today: NaiveDate,
    ) -> AppResult<Vec<Membership>> {
        self.expire_overdue(Some(gym_id), today).await?;
        let (limit, offset) = page(filter.limit, filter.offset);

        let memberships = sqlx::query_as::<_, Membership>(
            r#"
            SELECT * FROM memberships
            WHERE gym_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::uuid IS NULL OR plan_id = $3)
              AND ($4::uuid IS NULL OR trainer_id = $4)
              AND ($5::membership_status IS NULL OR status = $5)
              AND ($6::int IS NULL OR (status = 'active' AND end_date BETWEEN $7 AND $7 + $6::int))
            ORDER BY end_date DESC, created_at DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(gym_id)
        .bind(filter.user_id)
        .bind(filter.plan_id)
        .bind(filter.trainer_id)
        .bind(filter.status)
        .bind(filter.expiring_within_days.map(|days| days.max(0)))
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(memberships)
    }

    /// Flip `active` memberships whose period ended before `today` to `expired`.
    pub async fn expire_overdue(&self, gym_id: Option<Uuid>, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE memberships
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND end_date < $2 AND ($1::uuid IS NULL OR gym_id = $1)
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn update_membership(
        &self,
        gym_id: Uuid,
        membership_id: Uuid,
        request: UpdateMembershipRequest,
        today: NaiveDate,
    ) -> AppResult<Membership> {
        let current = self.get_membership(gym_id, membership_id, today).await?;

        let status = match request.status {
            None => current.status,
            Some(MembershipStatus::Expired | MembershipStatus::Cancelled) => {
                return Err(AppError::Validation(
                    "status can only be set to active or frozen; use cancel or renew instead".to_string(),
                ))
            }
            Some(requested) => match current.status {
                MembershipStatus::Cancelled => {
                    return Err(AppError::BadRequest("Membership is cancelled".to_string()))
                }
                MembershipStatus::Expired => {
                    return Err(AppError::BadRequest(
                        "Membership has expired; renew it instead".to_string(),
                    ))
                }
                _ => requested,
            },
        };

        let trainer_id = if request.clear_trainer {
            None
        } else {
            match request.trainer_id {
                Some(trainer_id) => Some(self.gym_trainer(gym_id, trainer_id).await?),
                None => current.trainer_id,
            }
        };

        let end_date = request.end_date.unwrap_or(current.end_date);
        if end_date < current.start_date {
            return Err(AppError::Validation(
                "end_date cannot precede start_date".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let reopens = status != current.status && status.is_running();
        if status.is_running() && (end_date != current.end_date || reopens) {
            let span = Span {
                user_id: current.user_id,
                gym_id,
                start_date: current.start_date,
                end_date,
            };
            ensure_no_overlap(&mut tx, &span, Some(current.id)).await?;
        }

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET trainer_id = $3, status = $4, end_date = $5, updated_at = NOW()
            WHERE id = $1 AND gym_id = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(gym_id)
        .bind(trainer_id)
        .bind(status)
        .bind(end_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(membership)
    }

    /// Open the next period for the member, continuing after their latest
    /// running membership at this gym or starting today when it has lapsed.
    pub async fn renew_membership(
        &self,
        gym_id: Uuid,
        membership_id: Uuid,
        plan_id: Option<Uuid>,
        today: NaiveDate,
    ) -> AppResult<Membership> {
        let current = self.get_membership(gym_id, membership_id, today).await?;
        if current.status == MembershipStatus::Cancelled {
            return Err(AppError::BadRequest(
                "Cancelled memberships cannot be renewed".to_string(),
            ));
        }

        let plan = self
            .sellable_plan(gym_id, plan_id.unwrap_or(current.plan_id))
            .await?;

        let mut tx = self.db.begin().await?;

        let latest_end: Option<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT MAX(end_date) FROM memberships
            WHERE user_id = $1 AND gym_id = $2 AND status IN ('active', 'frozen')
            "#,
        )
        .bind(current.user_id)
        .bind(gym_id)
        .fetch_one(&mut *tx)
        .await?;

        let continue_from = latest_end.map_or(current.end_date, |end| end.max(current.end_date));
        let start_date = renewal_start(continue_from, today);
        let period = NewPeriod {
            user_id: current.user_id,
            gym_id,
            plan_id: plan.id,
            trainer_id: current.trainer_id,
            start_date,
            end_date: period_end(start_date, plan.duration_days),
        };

        let renewed = insert_period(&mut tx, &period).await?;
        tx.commit().await?;

        tracing::info!(
            previous_id = %current.id,
            membership_id = %renewed.id,
            start = %renewed.start_date,
            end = %renewed.end_date,
            "renewed membership"
        );
        Ok(renewed)
    }

    pub async fn cancel_membership(&self, gym_id: Uuid, membership_id: Uuid) -> AppResult<Membership> {
        let cancelled = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND gym_id = $2 AND status <> 'cancelled'
            RETURNING *
            "#,
        )
        .bind(membership_id)
        .bind(gym_id)
        .fetch_optional(&self.db)
        .await?;

        if let Some(membership) = cancelled {
            tracing::info!(%membership_id, %gym_id, "cancelled membership");
            return Ok(membership);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM memberships WHERE id = $1 AND gym_id = $2)",
        )
        .bind(membership_id)
        .bind(gym_id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Err(AppError::BadRequest("Membership is already cancelled".to_string()))
        } else {
            Err(AppError::not_found("Membership"))
        }
    }

    pub async fn delete_membership(&self, gym_id: Uuid, membership_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = $1 AND gym_id = $2")
            .bind(membership_id)
            .bind(gym_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Membership"));
        }

        tracing::info!(%membership_id, %gym_id, "deleted membership");
        Ok(())
    }

    /// Membership granting `user_id` access to `gym_id` on `today`.
    pub async fn active_membership_for(
        &self,
        user_id: Uuid,
        gym_id: Uuid,
        today: NaiveDate,
    ) -> AppResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT * FROM memberships
            WHERE user_id = $1 AND gym_id = $2 AND status = 'active'
              AND start_date <= $3 AND end_date >= $3
            ORDER BY end_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(gym_id)
        .bind(today)
        .fetch_optional(&self.db)
        .await?;

        Ok(membership)
    }

    /// Members currently assigned to `trainer_id` through a running membership.
    pub async fn assigned_members(&self, gym_id: Uuid, trainer_id: Uuid, today: NaiveDate) -> AppResult<Vec<User>> {
        let members = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            WHERE u.gym_id = $1 AND EXISTS (
                SELECT 1 FROM memberships m
                WHERE m.user_id = u.id AND m.gym_id = $1 AND m.trainer_id = $2
                  AND m.status IN ('active', 'frozen') AND m.end_date >= $3
            )
            ORDER BY u.full_name
            "#,
        )
        .bind(gym_id)
        .bind(trainer_id)
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    pub async fn is_assigned(&self, gym_id: Uuid, trainer_id: Uuid, member_id: Uuid, today: NaiveDate) -> AppResult<bool> {
        let assigned: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM memberships
                WHERE gym_id = $1 AND trainer_id = $2 AND user_id = $3
                  AND status IN ('active', 'frozen') AND end_date >= $4
            )
            "#,
        )
        .bind(gym_id)
        .bind(trainer_id)
        .bind(member_id)
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        Ok(assigned)
    }

    async fn sellable_plan(&self, gym_id: Uuid, plan_id: Uuid) -> AppResult<Plan> {
        let plan = self.plans.get_plan(gym_id, plan_id).await?;
        if !plan.is_active {
            return Err(AppError::Validation(format!(
                "plan '{}' is no longer offered",
                plan.name
            )));
        }
        Ok(plan)
    }

    async fn gym_trainer(&self, gym_id: Uuid, trainer_id: Uuid) -> AppResult<Uuid> {
        match self
            .users
            .get_gym_user(gym_id, trainer_id, &[UserRole::Trainer])
            .await
        {
            Ok(trainer) if trainer.is_active => Ok(trainer.id),
            Ok(_) | Err(AppError::NotFound(_)) => Err(AppError::Validation(
                "trainer_id must reference an active trainer of this gym".to_string(),
            )),
            Err(err) => Err(err),
        }
    }
}

/// Member and dates a running membership would occupy.
struct Span {
    user_id: Uuid,
    gym_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// Lock the member row and fail when `span` overlaps another running
/// membership of theirs at the same gym. `exclude` skips the row being edited.
async fn ensure_no_overlap(
    tx: &mut Transaction<'_, Postgres>,
    span: &Span,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    // serialises concurrent writes for the same member
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(span.user_id)
        .execute(&mut **tx)
        .await?;

    let overlaps: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM memberships
            WHERE user_id = $1 AND gym_id = $2 AND status IN ('active', 'frozen')
              AND start_date <= $4 AND end_date >= $3
              AND ($5::uuid IS NULL OR id <> $5)
        )
        "#,
    )
    .bind(span.user_id)
    .bind(span.gym_id)
    .bind(span.start_date)
    .bind(span.end_date)
    .bind(exclude)
    .fetch_one(&mut **tx)
    .await?;

    if overlaps {
        return Err(AppError::AlreadyExists("Overlapping membership".to_string()));
    }
    Ok(())
}

/// Insert a period after making sure it does not overlap another running
/// membership of the same member at the same gym.
async fn insert_period(tx: &mut Transaction<'_, Postgres>, period: &NewPeriod) -> AppResult<Membership> {
    let span = Span {
        user_id: period.user_id,
        gym_id: period.gym_id,
        start_date: period.start_date,
        end_date: period.end_date,
    };
    ensure_no_overlap(tx, &span, None).await?;

    let membership = sqlx::query_as::<_, Membership>(
        r#"
        INSERT INTO memberships (id, user_id, gym_id, plan_id, trainer_id, start_date, end_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'active')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(period.user_id)
    .bind(period.gym_id)
    .bind(period.plan_id)
    .bind(period.trainer_id)
    .bind(period.start_date)
    .bind(period.end_date)
    .fetch_one(&mut **tx)
    .await?;

    Ok(membership)
}
