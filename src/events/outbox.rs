//! Transactional outbox.
//!
//! Events are inserted on the caller's connection, so they commit or roll
//! back with the change they describe. Delivery (the invite e-mail, for
//! instance) belongs to an external consumer that polls
//! [`OutboxService::fetch_unpublished`] and acknowledges with
//! [`OutboxService::mark_published`].

use diesel::prelude::*;
use diesel::result::Error as DieselError;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::{NewOutboxEvent, OutboxEvent};
use crate::schema::outbox_events;

use super::types::{DomainEvent, EventType};

#[derive(Debug, Clone, Copy)]
pub struct OutboxService;

impl OutboxService {
    #[instrument(
        skip_all,
        fields(event_type = %event.event_type, aggregate_id = %event.aggregate_id)
    )]
    pub fn record(conn: &mut PgConnection, event: DomainEvent) -> Result<OutboxEvent, DieselError> {
        let row = NewOutboxEvent {
            event_type: event.event_type.as_str().to_owned(),
            aggregate_type: event.event_type.aggregate().as_str().to_owned(),
            aggregate_id: event.aggregate_id,
            payload: event.envelope(),
        };

        let stored = diesel::insert_into(outbox_events::table)
            .values(&row)
            .returning(OutboxEvent::as_returning())
            .get_result(conn)?;

        debug!(outbox_id = %stored.id, "Outbox event recorded");
        Ok(stored)
    }

    /// Oldest first, optionally restricted to one event type.
    pub fn fetch_unpublished(
        conn: &mut PgConnection,
        only: Option<EventType>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, DieselError> {
        let mut query = outbox_events::table
            .filter(outbox_events::published.eq(false))
            .into_boxed();
        if let Some(event_type) = only {
            query = query.filter(outbox_events::event_type.eq(event_type.as_str()));
        }

        query
            .order((outbox_events::created_at.asc(), outbox_events::id.asc()))
            .limit(limit.max(0))
            .select(OutboxEvent::as_select())
            .load(conn)
    }

    /// Returns how many rows flipped to published. Already published ids are
    /// not counted twice.
    #[instrument(skip_all, fields(requested = ids.len()))]
    pub fn mark_published(conn: &mut PgConnection, ids: &[Uuid]) -> Result<usize, DieselError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let updated = diesel::update(
            outbox_events::table
                .filter(outbox_events::id.eq_any(ids))
                .filter(outbox_events::published.eq(false)),
        )
        .set((
            outbox_events::published.eq(true),
            outbox_events::published_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;

        debug!(updated, "Outbox events acknowledged");
        Ok(updated)
    }
}
