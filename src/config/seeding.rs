use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;

use crate::auth::UserRole;
use crate::config::AppConfig;
use crate::models::*;
use crate::services::*;

const DEMO_OWNER_EMAIL: &str = "owner@demo-gym.example";
const DEMO_PASSWORD: &str = "DemoGym#2024";

pub struct DatabaseSeeder {
    pool: PgPool,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn seed_all(&self, config: &AppConfig) -> Result<()> {
        tracing::info!("Starting database seeding...");

        self.seed_permissions().await?;
        self.seed_og_user(config).await?;
        if config.seed_demo_data {
            self.seed_demo_data().await?;
        }

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_permissions(&self) -> Result<()> {
        PermissionService::new(self.pool.clone()).seed_defaults().await?;
        Ok(())
    }

    /// Platform operators cannot sign up; the first one comes from the
    /// environment.
    async fn seed_og_user(&self, config: &AppConfig) -> Result<()> {
        let (Some(email), Some(password)) = (&config.og_email, &config.og_password) else {
            return Ok(());
        };

        let user_service = UserService::new(self.pool.clone());
        if user_service.get_user_by_email(email).await?.is_some() {
            return Ok(());
        }

        let og = user_service
            .create_user(CreateUser {
                email: email.clone(),
                password: password.clone(),
                full_name: "Platform Operator".to_string(),
                phone: None,
                role: UserRole::Og,
                gym_id: None,
            })
            .await?;

        tracing::info!(user_id = %og.id, "Created bootstrap OG user");
        Ok(())
    }

    async fn seed_demo_data(&self) -> Result<()> {
        let user_service = UserService::new(self.pool.clone());
        if user_service.get_user_by_email(DEMO_OWNER_EMAIL).await?.is_some() {
            tracing::info!("Demo data already present, skipping");
            return Ok(());
        }

        let today = Utc::now().date_naive();
        let subscription_service = SubscriptionService::new(self.pool.clone());
        let og_plan = match subscription_service
            .list_og_plans(false)
            .await?
            .into_iter()
            .find(|plan| plan.name == "Starter")
        {
            Some(plan) => plan,
            None => {
                subscription_service
                    .create_og_plan(CreateOgPlanRequest {
                        name: "Starter".to_string(),
                        description: Some("Up to 100 members".to_string()),
                        price_cents: 4_900,
                        duration_days: 30,
                        max_members: Some(100),
                    })
                    .await?
            }
        };

        let owner = user_service
            .create_user(CreateUser {
                email: DEMO_OWNER_EMAIL.to_string(),
                password: DEMO_PASSWORD.to_string(),
                full_name: "Dana Demo".to_string(),
                phone: None,
                role: UserRole::Admin,
                gym_id: None,
            })
            .await?;

        let gym = GymService::new(self.pool.clone())
            .create_gym(
                owner.id,
                CreateGymRequest {
                    name: "Demo Fitness".to_string(),
                    address: Some("1 Barbell Street".to_string()),
                    phone: None,
                    email: Some("hello@demo-gym.example".to_string()),
                },
            )
            .await?;
        subscription_service
            .subscribe(gym.id, og_plan.id, None, today)
            .await?;

        let plan_service = PlanService::new(self.pool.clone());
        let monthly = plan_service
            .create_plan(
                gym.id,
                CreatePlanRequest {
                    name: "Monthly".to_string(),
                    description: Some("Unlimited access for 30 days".to_string()),
                    price_cents: 3_500,
                    duration_days: 30,
                },
            )
            .await?;
        plan_service
            .create_plan(
                gym.id,
                CreatePlanRequest {
                    name: "Annual".to_string(),
                    description: Some("Unlimited access for a year".to_string()),
                    price_cents: 35_000,
                    duration_days: 365,
                },
            )
            .await?;

        let demo_people = [
            ("frontdesk@demo-gym.example", "Sam Frontdesk", UserRole::Staff),
            ("coach@demo-gym.example", "Alex Coach", UserRole::Trainer),
            ("member@demo-gym.example", "Jordan Member", UserRole::Member),
        ];
        let mut created = Vec::new();
        for (email, full_name, role) in demo_people {
            let user = user_service
                .create_user(CreateUser {
                    email: email.to_string(),
                    password: DEMO_PASSWORD.to_string(),
                    full_name: full_name.to_string(),
                    phone: None,
                    role,
                    gym_id: Some(gym.id),
                })
                .await?;
            created.push(user);
        }
        let (trainer, member) = (&created[1], &created[2]);

        let membership = MembershipService::new(self.pool.clone())
            .create_membership(
                gym.id,
                CreateMembershipRequest {
                    user_id: member.id,
                    plan_id: monthly.id,
                    trainer_id: Some(trainer.id),
                    start_date: None,
                },
                today,
            )
            .await?;

        PaymentService::new(self.pool.clone())
            .record_payment(
                gym.id,
                owner.id,
                CreatePaymentRequest {
                    user_id: member.id,
                    membership_id: Some(membership.id),
                    amount_cents: monthly.price_cents,
                    method: PaymentMethod::Card,
                    notes: Some("Demo payment".to_string()),
                    paid_at: None,
                },
            )
            .await?;

        AnnouncementService::new(self.pool.clone())
            .create_announcement(
                gym.id,
                owner.id,
                CreateAnnouncementRequest {
                    title: "Welcome to Demo Fitness".to_string(),
                    body: "The squat racks have been replaced. Enjoy!".to_string(),
                    audience: None,
                    is_pinned: true,
                    expires_at: None,
                },
            )
            .await?;

        tracing::info!(gym_id = %gym.id, "Seeded demo gym");
        Ok(())
    }
}
