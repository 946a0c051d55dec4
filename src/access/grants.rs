//! Consultant-to-dog access grants.
//!
//! A consultant has access to a dog while at least one grant row for the pair
//! has no `revoked_at`. Grants are only written when an invite is accepted.

use std::future::Future;

use diesel::dsl::exists;
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::error::AccessResult;
use crate::models::{ConsultantAccess, NewConsultantAccess};
use crate::schema::consultant_access;
use crate::DbPool;

pub trait AccessLookup: Send + Sync {
    fn has_access(
        &self,
        consultant_id: Uuid,
        dog_id: Uuid,
    ) -> impl Future<Output = AccessResult<bool>> + Send;
}

pub fn has_access_in(
    conn: &mut PgConnection,
    consultant_id: Uuid,
    dog_id: Uuid,
) -> AccessResult<bool> {
    let active = diesel::select(exists(
        consultant_access::table
            .filter(consultant_access::consultant_id.eq(consultant_id))
            .filter(consultant_access::dog_id.eq(dog_id))
            .filter(consultant_access::revoked_at.is_null()),
    ))
    .get_result(conn)?;
    Ok(active)
}

/// Inserts a new active grant. Existing grants for the pair are left alone,
/// so repeated acceptances accumulate rows.
pub fn grant_access_in(
    conn: &mut PgConnection,
    consultant_id: Uuid,
    dog_id: Uuid,
) -> AccessResult<ConsultantAccess> {
    let access = diesel::insert_into(consultant_access::table)
        .values(&NewConsultantAccess {
            consultant_id,
            dog_id,
        })
        .returning(ConsultantAccess::as_returning())
        .get_result(conn)?;

    debug!(
        consultant_id = %consultant_id,
        dog_id = %dog_id,
        access_id = %access.id,
        "Consultant access granted"
    );
    Ok(access)
}

pub fn list_grants_in(
    conn: &mut PgConnection,
    consultant_id: Uuid,
    dog_id: Uuid,
) -> AccessResult<Vec<ConsultantAccess>> {
    let grants = consultant_access::table
        .filter(consultant_access::consultant_id.eq(consultant_id))
        .filter(consultant_access::dog_id.eq(dog_id))
        .order(consultant_access::granted_at.asc())
        .select(ConsultantAccess::as_select())
        .load(conn)?;
    Ok(grants)
}

#[derive(Clone)]
pub struct PgAccessGrants {
    pool: DbPool,
}

impl PgAccessGrants {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AccessLookup for PgAccessGrants {
    async fn has_access(&self, consultant_id: Uuid, dog_id: Uuid) -> AccessResult<bool> {
        let mut conn = self.pool.get()?;
        has_access_in(&mut conn, consultant_id, dog_id)
    }
}
