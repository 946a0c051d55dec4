//! Access control: roles and their permission sets, per-user permission
//! grants, consultant-to-dog grants, the invite lifecycle, and the
//! authorization decision that combines them.

pub mod authorizer;
pub mod catalog;
pub mod error;
pub mod grants;
pub mod invites;
pub mod permissions;
pub mod policy;

pub use authorizer::Authorizer;
pub use catalog::Role;
pub use error::{AccessError, AccessResult};
pub use grants::{AccessLookup, PgAccessGrants};
pub use invites::{InviteRejection, InviteService, InviteStatus};
pub use permissions::{GrantReport, PermissionLookup, PgPermissionStore};
pub use policy::{Decision, DenyReason, DogRef, Operation, Resource, ResourceKind, Subject};

/// The authorizer wired to the Postgres stores.
pub type AppAuthorizer = Authorizer<PgPermissionStore, PgAccessGrants>;
