use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::UserRole;

/// Fine-grained capability that can be granted to gym-scoped roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "members:read")]
    MembersRead,
    #[serde(rename = "members:write")]
    MembersWrite,
    #[serde(rename = "memberships:read")]
    MembershipsRead,
    #[serde(rename = "memberships:write")]
    MembershipsWrite,
    #[serde(rename = "payments:read")]
    PaymentsRead,
    #[serde(rename = "payments:write")]
    PaymentsWrite,
    #[serde(rename = "attendance:read")]
    AttendanceRead,
    #[serde(rename = "attendance:write")]
    AttendanceWrite,
    #[serde(rename = "announcements:read")]
    AnnouncementsRead,
    #[serde(rename = "announcements:write")]
    AnnouncementsWrite,
    #[serde(rename = "plans:read")]
    PlansRead,
    #[serde(rename = "plans:write")]
    PlansWrite,
    #[serde(rename = "dashboard:read")]
    DashboardRead,
}

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::MembersRead,
        Permission::MembersWrite,
        Permission::MembershipsRead,
        Permission::MembershipsWrite,
        Permission::PaymentsRead,
        Permission::PaymentsWrite,
        Permission::AttendanceRead,
        Permission::AttendanceWrite,
        Permission::AnnouncementsRead,
        Permission::AnnouncementsWrite,
        Permission::PlansRead,
        Permission::PlansWrite,
        Permission::DashboardRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::MembersRead => "members:read",
            Permission::MembersWrite => "members:write",
            Permission::MembershipsRead => "memberships:read",
            Permission::MembershipsWrite => "memberships:write",
            Permission::PaymentsRead => "payments:read",
            Permission::PaymentsWrite => "payments:write",
            Permission::AttendanceRead => "attendance:read",
            Permission::AttendanceWrite => "attendance:write",
            Permission::AnnouncementsRead => "announcements:read",
            Permission::AnnouncementsWrite => "announcements:write",
            Permission::PlansRead => "plans:read",
            Permission::PlansWrite => "plans:write",
            Permission::DashboardRead => "dashboard:read",
        }
    }

    /// Grants seeded into an empty `role_permissions` table. Owners and the
    /// platform operator hold every permission implicitly.
    pub fn defaults_for(role: UserRole) -> Vec<Permission> {
        use Permission::*;

        match role {
            UserRole::Og | UserRole::Admin => Vec::new(),
            UserRole::Staff => vec![
                MembersRead,
                MembersWrite,
                MembershipsRead,
                MembershipsWrite,
                PaymentsRead,
                PaymentsWrite,
                AttendanceRead,
                AttendanceWrite,
                AnnouncementsRead,
                PlansRead,
                DashboardRead,
            ],
            UserRole::Trainer => vec![
                MembersRead,
                AttendanceRead,
                AttendanceWrite,
                AnnouncementsRead,
                AnnouncementsWrite,
                PlansRead,
            ],
            UserRole::Member => vec![AnnouncementsRead, PlansRead],
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    pub role: UserRole,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionGrantRequest {
    pub role: UserRole,
    pub permission: Permission,
}

#[derive(Debug, Default, Deserialize)]
pub struct PermissionQuery {
    pub role: Option<UserRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
            assert_eq!(serde_json::to_value(permission).unwrap(), permission.as_str());
        }
        assert!("members:delete".parse::<Permission>().is_err());
    }

    #[test]
    fn test_default_matrix() {
        let staff = Permission::defaults_for(UserRole::Staff);
        assert!(staff.contains(&Permission::PaymentsWrite));
        assert!(!staff.contains(&Permission::PlansWrite));

        let trainer = Permission::defaults_for(UserRole::Trainer);
        assert!(trainer.contains(&Permission::AttendanceWrite));
        assert!(!trainer.contains(&Permission::PaymentsRead));
        assert!(!trainer.contains(&Permission::MembersWrite));

        let member = Permission::defaults_for(UserRole::Member);
        assert_eq!(member, vec![Permission::AnnouncementsRead, Permission::PlansRead]);

        assert!(Permission::defaults_for(UserRole::Admin).is_empty());
        assert!(Permission::defaults_for(UserRole::Og).is_empty());
    }
}
