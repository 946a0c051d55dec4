//! Request-time authorization: resolves the relationship facts a decision
//! needs, runs [`decide`], and applies endpoint permission gates.

use tracing::debug;

use super::error::{AccessError, AccessResult};
use super::grants::AccessLookup;
use super::permissions::PermissionLookup;
use super::policy::{decide, Decision, DenyReason, Operation, Relations, Resource, Subject};
use crate::telemetry::metrics::record_authorization;

#[derive(Clone)]
pub struct Authorizer<P, A> {
    permissions: P,
    grants: A,
}

impl<P: PermissionLookup, A: AccessLookup> Authorizer<P, A> {
    pub fn new(permissions: P, grants: A) -> Self {
        Self {
            permissions,
            grants,
        }
    }

    pub fn permissions(&self) -> &P {
        &self.permissions
    }

    pub fn grants(&self) -> &A {
        &self.grants
    }

    /// Loads the grants relevant to `resource`. Only consultants have any.
    pub async fn relations_for(
        &self,
        subject: &Subject,
        resource: &Resource,
    ) -> AccessResult<Relations> {
        let mut relations = Relations::none();
        if subject.is_consultant() {
            if let Some(dog) = resource.related_dog() {
                if self.grants.has_access(subject.user_id, dog.id).await? {
                    relations.grant(dog.id);
                }
            }
        }
        Ok(relations)
    }

    pub async fn authorize(
        &self,
        subject: &Subject,
        operation: Operation,
        resource: &Resource,
    ) -> AccessResult<Decision> {
        let relations = self.relations_for(subject, resource).await?;
        let decision = decide(subject, operation, resource, &relations);

        record_authorization(resource.kind().as_str(), operation.as_str(), decision.outcome());
        if let Decision::Deny(reason) = &decision {
            debug!(
                user_id = %subject.user_id,
                role = ?subject.role,
                resource = %resource.kind(),
                operation = %operation,
                reason = %reason,
                "Authorization denied"
            );
        }
        Ok(decision)
    }

    /// Like [`authorize`](Self::authorize) but turns a denial into
    /// [`AccessError::Forbidden`].
    pub async fn ensure(
        &self,
        subject: &Subject,
        operation: Operation,
        resource: &Resource,
    ) -> AccessResult<()> {
        self.authorize(subject, operation, resource)
            .await?
            .into_result()
            .map_err(AccessError::Forbidden)
    }

    /// Endpoint gate: the subject must hold at least one of `names`.
    /// Admins pass without a lookup.
    pub async fn require_any_permission(
        &self,
        subject: &Subject,
        names: &[&str],
    ) -> AccessResult<()> {
        if subject.is_admin() {
            return Ok(());
        }
        if self
            .permissions
            .has_any_permission(subject.user_id, names)
            .await?
        {
            return Ok(());
        }

        let reason = DenyReason::MissingPermission(names.iter().map(|n| n.to_string()).collect());
        debug!(user_id = %subject.user_id, reason = %reason, "Permission gate denied");
        Err(AccessError::Forbidden(reason))
    }
}
