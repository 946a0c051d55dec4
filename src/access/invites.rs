//! Invite lifecycle.
//!
//! An owner invites a consultant to one dog. The consultant redeems the
//! plaintext token once; only its SHA-256 digest is stored.
//!
//! ```text
//! pending --accept (in time, right consultant)--> accepted
//! pending --accept (after expires_at)----------> rejected
//! ```
//!
//! Both end states are terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::catalog::CONSULTANT_ASSIGNED_PERMISSIONS;
use super::error::{AccessError, AccessResult};
use super::grants::grant_access_in;
use super::permissions::{grant_many_in, GrantReport};
use super::policy::DogRef;
use crate::events::{DomainEvent, EventType, OutboxService};
use crate::models::{ConsultantAccess, Invite, NewInvite};
use crate::schema::invites;
use crate::telemetry::metrics::record_invite_transition;

pub const DEFAULT_INVITE_TTL_HOURS: i64 = 24;
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "rejected" => Ok(InviteStatus::Rejected),
            other => Err(format!("unknown invite status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InviteRejection {
    #[error("invite is not pending")]
    NotPending,
    #[error("invite expired")]
    Expired,
    #[error("invite not for this consultant")]
    WrongConsultant,
}

impl InviteRejection {
    pub fn code(&self) -> &'static str {
        match self {
            InviteRejection::NotPending => "INVITE_NOT_PENDING",
            InviteRejection::Expired => "INVITE_EXPIRED",
            InviteRejection::WrongConsultant => "INVITE_WRONG_CONSULTANT",
        }
    }
}

/// What an acceptance attempt does to an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    /// Flip to rejected, then report the invite as expired.
    Expire,
    /// Leave the invite untouched.
    Refuse(InviteRejection),
}

/// Decides the transition for an acceptance attempt at `now`. Unknown stored
/// statuses are treated as terminal.
pub fn evaluate(invite: &Invite, consultant_id: Uuid, now: NaiveDateTime) -> Transition {
    if invite.status() != Some(InviteStatus::Pending) {
        return Transition::Refuse(InviteRejection::NotPending);
    }
    if now > invite.expires_at {
        return Transition::Expire;
    }
    if invite.consultant_id != consultant_id {
        return Transition::Refuse(InviteRejection::WrongConsultant);
    }
    Transition::Accept
}

pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A freshly created invite together with its plaintext token.
#[derive(Debug)]
pub struct IssuedInvite {
    pub invite: Invite,
    pub token: String,
}

#[derive(Debug)]
pub struct AcceptedInvite {
    pub invite: Invite,
    pub access: ConsultantAccess,
    pub grants: GrantReport,
}

enum AcceptOutcome {
    Accepted(AcceptedInvite),
    Refused(InviteRejection),
}

#[derive(Debug, Clone, Copy)]
pub struct InviteService {
    ttl: Duration,
}

impl Default for InviteService {
    fn default() -> Self {
        Self::new(DEFAULT_INVITE_TTL_HOURS)
    }
}

impl InviteService {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a pending invite on behalf of the dog's owner. The caller has
    /// already checked that `actor_id` may invite for `dog` and that the
    /// consultant exists. The invite records the dog's owner; the actor only
    /// appears in the outbox metadata.
    #[instrument(skip(self, conn))]
    pub fn create_invite(
        &self,
        conn: &mut PgConnection,
        actor_id: Uuid,
        consultant_id: Uuid,
        dog: DogRef,
    ) -> AccessResult<IssuedInvite> {
        self.create_invite_at(conn, actor_id, consultant_id, dog, Utc::now().naive_utc())
    }

    pub fn create_invite_at(
        &self,
        conn: &mut PgConnection,
        actor_id: Uuid,
        consultant_id: Uuid,
        dog: DogRef,
        now: NaiveDateTime,
    ) -> AccessResult<IssuedInvite> {
        let token = generate_token();
        let dog_id = dog.id;
        let new_invite = NewInvite {
            owner_id: dog.owner_id,
            consultant_id,
            dog_id,
            token_hash: hash_token(&token),
            status: InviteStatus::Pending.as_str().to_string(),
            expires_at: now + self.ttl,
        };

        let invite = conn.transaction::<_, AccessError, _>(|conn| {
            let invite = diesel::insert_into(invites::table)
                .values(&new_invite)
                .returning(Invite::as_returning())
                .get_result(conn)?;

            // Notification hook for the consultant. The token itself never
            // leaves the create response.
            OutboxService::record(
                conn,
                DomainEvent::new(
                    EventType::InviteCreated,
                    invite.id,
                    serde_json::json!({
                        "consultant_id": consultant_id,
                        "dog_id": dog_id,
                        "expires_at": invite.expires_at,
                    }),
                )
                .by(actor_id),
            )?;
            Ok(invite)
        })?;

        record_invite_transition("created");
        info!(
            invite_id = %invite.id,
            owner_id = %invite.owner_id,
            actor_id = %actor_id,
            consultant_id = %consultant_id,
            dog_id = %dog_id,
            "Invite created"
        );
        Ok(IssuedInvite { invite, token })
    }

    #[instrument(skip(self, conn, token))]
    pub fn accept_invite(
        &self,
        conn: &mut PgConnection,
        token: &str,
        consultant_id: Uuid,
    ) -> AccessResult<AcceptedInvite> {
        self.accept_invite_at(conn, token, consultant_id, Utc::now().naive_utc())
    }

    /// Redeems an invite token as of `now`.
    ///
    /// The invite row is locked for the whole transaction, so of two
    /// concurrent redemptions exactly one sees it pending.
    pub fn accept_invite_at(
        &self,
        conn: &mut PgConnection,
        token: &str,
        consultant_id: Uuid,
        now: NaiveDateTime,
    ) -> AccessResult<AcceptedInvite> {
        let token_hash = hash_token(token);

        let outcome = conn.transaction::<_, AccessError, _>(|conn| {
            let invite: Invite = invites::table
                .filter(invites::token_hash.eq(&token_hash))
                .select(Invite::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or(AccessError::not_found("invite"))?;

            match evaluate(&invite, consultant_id, now) {
                Transition::Refuse(rejection) => Ok(AcceptOutcome::Refused(rejection)),
                Transition::Expire => {
                    // Committed even though the caller sees an error.
                    diesel::update(invites::table.find(invite.id))
                        .set(invites::status.eq(InviteStatus::Rejected.as_str()))
                        .execute(conn)?;
                    OutboxService::record(
                        conn,
                        DomainEvent::new(
                            EventType::InviteExpired,
                            invite.id,
                            serde_json::json!({ "expired_at": invite.expires_at }),
                        )
                        .by(consultant_id),
                    )?;
                    Ok(AcceptOutcome::Refused(InviteRejection::Expired))
                }
                Transition::Accept => {
                    let access = grant_access_in(conn, consultant_id, invite.dog_id)?;
                    let grants =
                        grant_many_in(conn, consultant_id, CONSULTANT_ASSIGNED_PERMISSIONS);

                    let invite = diesel::update(invites::table.find(invite.id))
                        .set(invites::status.eq(InviteStatus::Accepted.as_str()))
                        .returning(Invite::as_returning())
                        .get_result(conn)?;

                    OutboxService::record(
                        conn,
                        DomainEvent::new(
                            EventType::InviteAccepted,
                            invite.id,
                            serde_json::json!({
                                "dog_id": invite.dog_id,
                                "access_id": access.id,
                                "granted": grants.granted,
                                "failed": grants.failed_names(),
                            }),
                        )
                        .by(consultant_id),
                    )?;

                    Ok(AcceptOutcome::Accepted(AcceptedInvite {
                        invite,
                        access,
                        grants,
                    }))
                }
            }
        })?;

        match outcome {
            AcceptOutcome::Accepted(accepted) => {
                accepted.grants.log_failures(consultant_id, "invite acceptance");
                record_invite_transition("accepted");
                info!(
                    invite_id = %accepted.invite.id,
                    consultant_id = %consultant_id,
                    dog_id = %accepted.invite.dog_id,
                    "Invite accepted"
                );
                Ok(accepted)
            }
            AcceptOutcome::Refused(rejection) => {
                let outcome = match rejection {
                    InviteRejection::Expired => "expired",
                    _ => "refused",
                };
                record_invite_transition(outcome);
                info!(
                    consultant_id = %consultant_id,
                    reason = %rejection,
                    "Invite acceptance refused"
                );
                Err(AccessError::InvalidState(rejection))
            }
        }
    }
}
