use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{page, CreatePaymentRequest, Payment, PaymentFilter, PaymentStatus};
use crate::services::UserService;

#[derive(Debug, Clone)]
pub struct PaymentService {
    db: PgPool,
    users: UserService,
}

impl PaymentService {
    pub fn new(db: PgPool) -> Self {
        Self {
            users: UserService::new(db.clone()),
            db,
        }
    }

    pub async fn record_payment(
        &self,
        gym_id: Uuid,
        recorded_by: Uuid,
        request: CreatePaymentRequest,
    ) -> AppResult<Payment> {
        if request.amount_cents <= 0 {
            return Err(AppError::Validation("amount_cents must be positive".to_string()));
        }

        let payer = self
            .users
            .get_gym_user(gym_id, request.user_id, &[UserRole::Member])
            .await?;

        if let Some(membership_id) = request.membership_id {
            let belongs: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM memberships WHERE id = $1 AND user_id = $2 AND gym_id = $3)",
            )
            .bind(membership_id)
            .bind(payer.id)
            .bind(gym_id)
            .fetch_one(&self.db)
            .await?;

            if !belongs {
                return Err(AppError::Validation(
                    "membership_id must reference a membership of this member".to_string(),
                ));
            }
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (id, gym_id, user_id, membership_id, amount_cents, method, status, notes, recorded_by, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'completed', $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gym_id)
        .bind(payer.id)
        .bind(request.membership_id)
        .bind(request.amount_cents)
        .bind(request.method)
        .bind(&request.notes)
        .bind(recorded_by)
        .bind(request.paid_at.unwrap_or_else(Utc::now))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            payment_id = %payment.id,
            %gym_id,
            amount_cents = payment.amount_cents,
            "recorded payment"
        );
        Ok(payment)
    }

    pub async fn get_payment(&self, gym_id: Uuid, payment_id: Uuid) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 AND gym_id = $2")
            .bind(payment_id)
            .bind(gym_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))
    }

    pub async fn list_payments(&self, gym_id: Uuid, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        let (limit, offset) = page(filter.limit, filter.offset);

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE gym_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::uuid IS NULL OR membership_id = $3)
              AND ($4::payment_method IS NULL OR method = $4)
              AND ($5::payment_status IS NULL OR status = $5)
              AND ($6::date IS NULL OR paid_at::date >= $6)
              AND ($7::date IS NULL OR paid_at::date <= $7)
            ORDER BY paid_at DESC
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(gym_id)
        .bind(filter.user_id)
        .bind(filter.membership_id)
        .bind(filter.method)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    pub async fn refund_payment(&self, gym_id: Uuid, payment_id: Uuid) -> AppResult<Payment> {
        let payment = self.get_payment(gym_id, payment_id).await?;
        if payment.status == PaymentStatus::Refunded {
            return Err(AppError::BadRequest("Payment is already refunded".to_string()));
        }

        let refunded = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET status = 'refunded'
            WHERE id = $1 AND gym_id = $2 AND status = 'completed'
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(gym_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Payment is already refunded".to_string()))?;

        tracing::info!(%payment_id, %gym_id, amount_cents = refunded.amount_cents, "refunded payment");
        Ok(refunded)
    }

    pub async fn delete_payment(&self, gym_id: Uuid, payment_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1 AND gym_id = $2")
            .bind(payment_id)
            .bind(gym_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Payment"));
        }

        tracing::info!(%payment_id, %gym_id, "deleted payment");
        Ok(())
    }
}
