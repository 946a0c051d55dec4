//! Permission store: which named permissions each user holds.
//!
//! The `*_in` functions work on a borrowed connection so they can take part
//! in a caller's transaction. [`PgPermissionStore`] wraps them with a pool and
//! the optional Redis permission cache.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use diesel::dsl::exists;
use diesel::prelude::*;
use tracing::{debug, warn};
use uuid::Uuid;

use super::catalog::{backfill_role_permissions, BackfillSummary};
use super::error::{AccessError, AccessResult};
use crate::cache::PermissionCache;
use crate::models::NewUserPermission;
use crate::schema::{permissions, user_permissions};
use crate::telemetry::metrics::record_permission_check;
use crate::DbPool;

/// Read side of the permission store, as seen by the authorizer.
pub trait PermissionLookup: Send + Sync {
    fn has_permission(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> impl Future<Output = AccessResult<bool>> + Send;

    /// True if the user holds at least one of `names`.
    fn has_any_permission(
        &self,
        user_id: Uuid,
        names: &[&str],
    ) -> impl Future<Output = AccessResult<bool>> + Send;
}

#[derive(Debug)]
pub struct GrantFailure {
    pub permission: String,
    pub error: AccessError,
}

/// Outcome of a best-effort batch grant.
#[derive(Debug, Default)]
pub struct GrantReport {
    pub granted: Vec<String>,
    pub failed: Vec<GrantFailure>,
}

impl GrantReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.permission.as_str()).collect()
    }

    pub fn log_failures(&self, user_id: Uuid, context: &str) {
        for failure in &self.failed {
            warn!(
                user_id = %user_id,
                permission = %failure.permission,
                error = %failure.error,
                context,
                "Permission grant failed"
            );
        }
    }
}

fn permission_id(conn: &mut PgConnection, name: &str) -> AccessResult<Uuid> {
    permissions::table
        .filter(permissions::name.eq(name))
        .select(permissions::id)
        .first(conn)
        .optional()?
        .ok_or(AccessError::not_found("permission"))
}

/// Grants `name` to the user. Granting a held permission is a no-op.
pub fn grant_in(conn: &mut PgConnection, user_id: Uuid, name: &str) -> AccessResult<()> {
    let permission_id = permission_id(conn, name)?;

    let inserted = diesel::insert_into(user_permissions::table)
        .values(&NewUserPermission {
            user_id,
            permission_id,
        })
        .on_conflict((user_permissions::user_id, user_permissions::permission_id))
        .do_nothing()
        .execute(conn)?;

    debug!(user_id = %user_id, permission = %name, inserted, "Permission granted");
    Ok(())
}

/// Grants each name independently. Every grant runs in its own savepoint, so
/// a failure leaves an enclosing transaction usable.
pub fn grant_many_in(conn: &mut PgConnection, user_id: Uuid, names: &[&str]) -> GrantReport {
    let mut report = GrantReport::default();
    for name in names {
        match conn.transaction::<_, AccessError, _>(|conn| grant_in(conn, user_id, name)) {
            Ok(()) => report.granted.push(name.to_string()),
            Err(error) => report.failed.push(GrantFailure {
                permission: name.to_string(),
                error,
            }),
        }
    }
    report
}

/// Removes the grant if present. Unknown permission names are `NotFound`.
pub fn revoke_in(conn: &mut PgConnection, user_id: Uuid, name: &str) -> AccessResult<bool> {
    let permission_id = permission_id(conn, name)?;

    let removed = diesel::delete(
        user_permissions::table
            .filter(user_permissions::user_id.eq(user_id))
            .filter(user_permissions::permission_id.eq(permission_id)),
    )
    .execute(conn)?;

    debug!(user_id = %user_id, permission = %name, removed, "Permission revoked");
    Ok(removed > 0)
}

pub fn has_permission_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    name: &str,
) -> AccessResult<bool> {
    has_any_permission_in(conn, user_id, &[name])
}

pub fn has_any_permission_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    names: &[&str],
) -> AccessResult<bool> {
    if names.is_empty() {
        return Ok(false);
    }

    let held = diesel::select(exists(
        user_permissions::table
            .inner_join(permissions::table)
            .filter(user_permissions::user_id.eq(user_id))
            .filter(permissions::name.eq_any(names.to_vec())),
    ))
    .get_result(conn)?;
    Ok(held)
}

pub fn list_permissions_in(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AccessResult<BTreeSet<String>> {
    let names: Vec<String> = user_permissions::table
        .inner_join(permissions::table)
        .filter(user_permissions::user_id.eq(user_id))
        .select(permissions::name)
        .load(conn)?;
    Ok(names.into_iter().collect())
}

/// Postgres-backed permission store with an optional Redis read cache.
#[derive(Clone)]
pub struct PgPermissionStore {
    pool: DbPool,
    cache: Arc<PermissionCache>,
}

impl PgPermissionStore {
    pub fn new(pool: DbPool, cache: Arc<PermissionCache>) -> Self {
        Self { pool, cache }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> AccessResult<T>,
    ) -> AccessResult<T> {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }

    pub async fn grant(&self, user_id: Uuid, name: &str) -> AccessResult<()> {
        self.with_conn(|conn| grant_in(conn, user_id, name))?;
        self.invalidate(user_id).await;
        Ok(())
    }

    pub async fn grant_many(&self, user_id: Uuid, names: &[&str]) -> AccessResult<GrantReport> {
        let report = self.with_conn(|conn| Ok(grant_many_in(conn, user_id, names)))?;
        if !report.granted.is_empty() {
            self.invalidate(user_id).await;
        }
        Ok(report)
    }

    pub async fn revoke(&self, user_id: Uuid, name: &str) -> AccessResult<bool> {
        let removed = self.with_conn(|conn| revoke_in(conn, user_id, name))?;
        self.invalidate(user_id).await;
        Ok(removed)
    }

    pub async fn list_permissions(&self, user_id: Uuid) -> AccessResult<BTreeSet<String>> {
        if let Some(cached) = self.cache.get(user_id).await {
            return Ok(cached);
        }

        let names = self.with_conn(|conn| list_permissions_in(conn, user_id))?;
        if let Err(e) = self.cache.set(user_id, names.clone()).await {
            debug!(user_id = %user_id, error = %e, "Permission cache not populated");
        }
        Ok(names)
    }

    /// Runs the role-default backfill and drops every cached snapshot it may
    /// have made stale. Cached sets outlive restarts, so this cannot be skipped.
    pub async fn backfill_role_defaults(&self) -> AccessResult<BackfillSummary> {
        let summary = self.with_conn(backfill_role_permissions)?;
        for user_id in &summary.user_ids {
            self.invalidate(*user_id).await;
        }
        Ok(summary)
    }

    /// Drops the cached permission set for a user after an out-of-band change.
    pub async fn invalidate(&self, user_id: Uuid) {
        if let Err(e) = self.cache.invalidate(user_id).await {
            debug!(user_id = %user_id, error = %e, "Permission cache not invalidated");
        }
    }

    async fn check(&self, user_id: Uuid, names: &[&str]) -> AccessResult<bool> {
        let start = Instant::now();

        if let Some(cached) = self.cache.get(user_id).await {
            let held = names.iter().any(|n| cached.contains(*n));
            record_permission_check(true, held, start.elapsed());
            return Ok(held);
        }

        let held = if self.cache.is_available() {
            self.list_permissions(user_id)
                .await?
                .iter()
                .any(|p| names.contains(&p.as_str()))
        } else {
            self.with_conn(|conn| has_any_permission_in(conn, user_id, names))?
        };

        record_permission_check(false, held, start.elapsed());
        Ok(held)
    }
}

impl PermissionLookup for PgPermissionStore {
    async fn has_permission(&self, user_id: Uuid, name: &str) -> AccessResult<bool> {
        self.check(user_id, &[name]).await
    }

    async fn has_any_permission(&self, user_id: Uuid, names: &[&str]) -> AccessResult<bool> {
        self.check(user_id, names).await
    }
}
