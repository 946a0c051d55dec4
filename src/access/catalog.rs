//! Role catalog: the static permission names, the default set each role
//! receives, and the backfill routine for accounts created before a set
//! changed.

use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AccessResult;
use super::permissions::{self, GrantReport};
use crate::schema::users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Consultant,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Consultant, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Consultant => "consultant",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "consultant" => Ok(Role::Consultant),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

pub const DOGS_CREATE: &str = "DOGS_CREATE";
pub const DOGS_VIEW_OWN: &str = "DOGS_VIEW_OWN";
pub const DOGS_UPDATE_OWN: &str = "DOGS_UPDATE_OWN";
pub const DOGS_DELETE_OWN: &str = "DOGS_DELETE_OWN";
pub const DOGS_VIEW_ASSIGNED: &str = "DOGS_VIEW_ASSIGNED";
pub const DOGS_VIEW_ALL: &str = "DOGS_VIEW_ALL";
pub const DOGS_UPDATE_ALL: &str = "DOGS_UPDATE_ALL";
pub const DOGS_DELETE_ALL: &str = "DOGS_DELETE_ALL";

pub const EVENTS_CREATE_OWN: &str = "EVENTS_CREATE_OWN";
pub const EVENTS_VIEW_OWN: &str = "EVENTS_VIEW_OWN";
pub const EVENTS_DELETE_OWN: &str = "EVENTS_DELETE_OWN";
pub const EVENTS_CREATE_ASSIGNED: &str = "EVENTS_CREATE_ASSIGNED";
pub const EVENTS_VIEW_ASSIGNED: &str = "EVENTS_VIEW_ASSIGNED";
pub const EVENTS_DELETE_ASSIGNED: &str = "EVENTS_DELETE_ASSIGNED";
pub const EVENTS_VIEW_ALL: &str = "EVENTS_VIEW_ALL";
pub const EVENTS_DELETE_ALL: &str = "EVENTS_DELETE_ALL";

pub const EVENT_COMMENTS_CREATE_OWN: &str = "EVENT_COMMENTS_CREATE_OWN";
pub const EVENT_COMMENTS_VIEW_OWN: &str = "EVENT_COMMENTS_VIEW_OWN";
pub const EVENT_COMMENTS_CREATE_ASSIGNED: &str = "EVENT_COMMENTS_CREATE_ASSIGNED";
pub const EVENT_COMMENTS_VIEW_ASSIGNED: &str = "EVENT_COMMENTS_VIEW_ASSIGNED";
pub const EVENT_COMMENTS_MODERATE_ALL: &str = "EVENT_COMMENTS_MODERATE_ALL";

pub const CONSULTANT_NOTES_CREATE: &str = "CONSULTANT_NOTES_CREATE";
pub const CONSULTANT_NOTES_VIEW_OWN: &str = "CONSULTANT_NOTES_VIEW_OWN";
pub const CONSULTANT_NOTES_VIEW_ALL: &str = "CONSULTANT_NOTES_VIEW_ALL";

pub const CONSULTANT_PROFILE_UPDATE_OWN: &str = "CONSULTANT_PROFILE_UPDATE_OWN";
pub const CONSULTANTS_SEARCH: &str = "CONSULTANTS_SEARCH";
pub const CONSULTANTS_INVITE: &str = "CONSULTANTS_INVITE";

pub const PERMISSIONS_MANAGE: &str = "PERMISSIONS_MANAGE";

/// Every permission name known to the system. Mirrors the rows seeded into
/// the `permissions` table by the initial migration.
pub const CATALOG: &[&str] = &[
    DOGS_CREATE,
    DOGS_VIEW_OWN,
    DOGS_UPDATE_OWN,
    DOGS_DELETE_OWN,
    DOGS_VIEW_ASSIGNED,
    DOGS_VIEW_ALL,
    DOGS_UPDATE_ALL,
    DOGS_DELETE_ALL,
    EVENTS_CREATE_OWN,
    EVENTS_VIEW_OWN,
    EVENTS_DELETE_OWN,
    EVENTS_CREATE_ASSIGNED,
    EVENTS_VIEW_ASSIGNED,
    EVENTS_DELETE_ASSIGNED,
    EVENTS_VIEW_ALL,
    EVENTS_DELETE_ALL,
    EVENT_COMMENTS_CREATE_OWN,
    EVENT_COMMENTS_VIEW_OWN,
    EVENT_COMMENTS_CREATE_ASSIGNED,
    EVENT_COMMENTS_VIEW_ASSIGNED,
    EVENT_COMMENTS_MODERATE_ALL,
    CONSULTANT_NOTES_CREATE,
    CONSULTANT_NOTES_VIEW_OWN,
    CONSULTANT_NOTES_VIEW_ALL,
    CONSULTANT_PROFILE_UPDATE_OWN,
    CONSULTANTS_SEARCH,
    CONSULTANTS_INVITE,
    PERMISSIONS_MANAGE,
];

pub const OWNER_PERMISSIONS: &[&str] = &[
    DOGS_CREATE,
    DOGS_VIEW_OWN,
    DOGS_UPDATE_OWN,
    DOGS_DELETE_OWN,
    EVENTS_CREATE_OWN,
    EVENTS_VIEW_OWN,
    EVENTS_DELETE_OWN,
    EVENT_COMMENTS_CREATE_OWN,
    EVENT_COMMENTS_VIEW_OWN,
    CONSULTANTS_SEARCH,
    CONSULTANTS_INVITE,
];

/// Granted to consultants at registration, before any invite is accepted.
pub const CONSULTANT_BASE_PERMISSIONS: &[&str] = &[
    CONSULTANT_PROFILE_UPDATE_OWN,
    CONSULTANTS_SEARCH,
    CONSULTANT_NOTES_VIEW_OWN,
];

/// Granted to a consultant each time they accept an invite.
pub const CONSULTANT_ASSIGNED_PERMISSIONS: &[&str] = &[
    DOGS_VIEW_ASSIGNED,
    EVENTS_CREATE_ASSIGNED,
    EVENTS_VIEW_ASSIGNED,
    EVENTS_DELETE_ASSIGNED,
    EVENT_COMMENTS_CREATE_ASSIGNED,
    EVENT_COMMENTS_VIEW_ASSIGNED,
    CONSULTANT_NOTES_CREATE,
];

pub const ADMIN_PERMISSIONS: &[&str] = CATALOG;

/// Default permission set for a role. Unrecognized roles get nothing.
pub fn defaults_for(role: Option<Role>) -> &'static [&'static str] {
    match role {
        Some(Role::Owner) => OWNER_PERMISSIONS,
        Some(Role::Consultant) => CONSULTANT_BASE_PERMISSIONS,
        Some(Role::Admin) => ADMIN_PERMISSIONS,
        None => &[],
    }
}

pub fn is_known_permission(name: &str) -> bool {
    CATALOG.contains(&name)
}

/// Grants a user the default set for their role, best-effort.
pub fn grant_role_defaults(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: Option<Role>,
) -> GrantReport {
    let report = permissions::grant_many_in(conn, user_id, defaults_for(role));
    report.log_failures(user_id, "role defaults");
    report
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillSummary {
    /// Every account that was processed, whether or not anything was missing.
    pub user_ids: Vec<Uuid>,
    pub granted: usize,
    pub failed: usize,
}

/// Grants every existing user the default set for their stored role.
///
/// Grants are idempotent, so running this repeatedly only fills gaps.
pub fn backfill_role_permissions(conn: &mut PgConnection) -> AccessResult<BackfillSummary> {
    let accounts: Vec<(Uuid, String)> = users::table
        .select((users::id, users::role))
        .order(users::created_at.asc())
        .load(conn)?;

    let mut summary = BackfillSummary::default();
    for (user_id, role) in accounts {
        let role = match role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Skipping backfill for user with unrecognized role"
                );
                None
            }
        };

        let report = grant_role_defaults(conn, user_id, role);
        summary.user_ids.push(user_id);
        summary.granted += report.granted.len();
        summary.failed += report.failed.len();
    }

    info!(
        users = summary.user_ids.len(),
        granted = summary.granted,
        failed = summary.failed,
        "Role permission backfill complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("Owner".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_catalog_has_no_duplicates() {
        let unique: HashSet<_> = CATALOG.iter().collect();
        assert_eq!(unique.len(), CATALOG.len());
    }

    #[test]
    fn test_every_role_set_is_within_catalog() {
        for set in [
            OWNER_PERMISSIONS,
            CONSULTANT_BASE_PERMISSIONS,
            CONSULTANT_ASSIGNED_PERMISSIONS,
        ] {
            for name in set {
                assert!(is_known_permission(name), "{name} missing from catalog");
            }
        }
    }

    #[test]
    fn test_admin_defaults_cover_whole_catalog() {
        assert_eq!(defaults_for(Some(Role::Admin)).len(), CATALOG.len());
    }

    #[test]
    fn test_unrecognized_role_grants_nothing() {
        assert!(defaults_for(None).is_empty());
    }

    #[test]
    fn test_consultant_base_excludes_assigned_permissions() {
        let base = defaults_for(Some(Role::Consultant));
        for name in CONSULTANT_ASSIGNED_PERMISSIONS {
            assert!(!base.contains(name), "{name} should only come from invites");
        }
    }

    #[test]
    fn test_owner_defaults_allow_inviting() {
        let owner = defaults_for(Some(Role::Owner));
        assert!(owner.contains(&CONSULTANTS_INVITE));
        assert!(owner.contains(&EVENTS_VIEW_OWN));
        assert!(!owner.contains(&PERMISSIONS_MANAGE));
    }
}
