use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::UserRole;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "announcement_audience", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementAudience {
    All,
    Members,
    Staff,
    Trainers,
}

impl AnnouncementAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementAudience::All => "all",
            AnnouncementAudience::Members => "members",
            AnnouncementAudience::Staff => "staff",
            AnnouncementAudience::Trainers => "trainers",
        }
    }

    /// Audiences a role may read. `None` means unrestricted.
    pub fn visible_to(role: UserRole) -> Option<Vec<AnnouncementAudience>> {
        match role {
            UserRole::Og | UserRole::Admin => None,
            UserRole::Staff => Some(vec![AnnouncementAudience::All, AnnouncementAudience::Staff]),
            UserRole::Trainer => Some(vec![
                AnnouncementAudience::All,
                AnnouncementAudience::Trainers,
            ]),
            UserRole::Member => Some(vec![
                AnnouncementAudience::All,
                AnnouncementAudience::Members,
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub audience: AnnouncementAudience,
    pub is_pinned: bool,
    pub published_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
    pub audience: Option<AnnouncementAudience>,
    #[serde(default)]
    pub is_pinned: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub body: Option<String>,
    pub audience: Option<AnnouncementAudience>,
    pub is_pinned: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnnouncementQuery {
    pub audience: Option<AnnouncementAudience>,
    pub include_expired: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_by_role() {
        assert_eq!(AnnouncementAudience::visible_to(UserRole::Admin), None);
        assert_eq!(AnnouncementAudience::visible_to(UserRole::Og), None);

        let member = AnnouncementAudience::visible_to(UserRole::Member).unwrap();
        assert!(member.contains(&AnnouncementAudience::All));
        assert!(member.contains(&AnnouncementAudience::Members));
        assert!(!member.contains(&AnnouncementAudience::Staff));

        let trainer = AnnouncementAudience::visible_to(UserRole::Trainer).unwrap();
        assert!(trainer.contains(&AnnouncementAudience::Trainers));
        assert!(!trainer.contains(&AnnouncementAudience::Members));
    }
}
