// Business logic services

pub mod announcement_service;
pub mod attendance_service;
pub mod dashboard_service;
pub mod gym_service;
pub mod membership_service;
pub mod payment_service;
pub mod permission_service;
pub mod plan_service;
pub mod subscription_service;
pub mod user_service;

pub use announcement_service::AnnouncementService;
pub use attendance_service::AttendanceService;
pub use dashboard_service::DashboardService;
pub use gym_service::GymService;
pub use membership_service::MembershipService;
pub use payment_service::PaymentService;
pub use permission_service::PermissionService;
pub use plan_service::PlanService;
pub use subscription_service::SubscriptionService;
pub use user_service::UserService;
