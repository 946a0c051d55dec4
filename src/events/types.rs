//! Domain events and the aggregates they describe.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    User,
    Dog,
    Invite,
}

impl AggregateType {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateType::User => "user",
            AggregateType::Dog => "dog",
            AggregateType::Invite => "invite",
        }
    }
}

/// Every event the service records. The wire name is `<aggregate>.<verb>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "user.registered")]
    UserRegistered,
    #[serde(rename = "dog.created")]
    DogCreated,
    #[serde(rename = "invite.created")]
    InviteCreated,
    #[serde(rename = "invite.accepted")]
    InviteAccepted,
    #[serde(rename = "invite.expired")]
    InviteExpired,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::UserRegistered => "user.registered",
            EventType::DogCreated => "dog.created",
            EventType::InviteCreated => "invite.created",
            EventType::InviteAccepted => "invite.accepted",
            EventType::InviteExpired => "invite.expired",
        }
    }

    pub fn aggregate(self) -> AggregateType {
        match self {
            EventType::UserRegistered => AggregateType::User,
            EventType::DogCreated => AggregateType::Dog,
            EventType::InviteCreated | EventType::InviteAccepted | EventType::InviteExpired => {
                AggregateType::Invite
            }
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The user whose request produced the event.
    pub actor_id: Option<Uuid>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// An event ready to be written to the outbox.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub event_type: EventType,
    pub aggregate_id: Uuid,
    pub data: serde_json::Value,
    pub metadata: EventMetadata,
}

impl DomainEvent {
    pub fn new(event_type: EventType, aggregate_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            event_type,
            aggregate_id,
            data,
            metadata: EventMetadata {
                actor_id: None,
                occurred_at: chrono::Utc::now(),
            },
        }
    }

    pub fn by(mut self, actor_id: Uuid) -> Self {
        self.metadata.actor_id = Some(actor_id);
        self
    }

    /// Stored payload: `{"data": .., "metadata": ..}`.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "data": self.data,
            "metadata": self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for event_type in [
            EventType::UserRegistered,
            EventType::DogCreated,
            EventType::InviteCreated,
            EventType::InviteAccepted,
            EventType::InviteExpired,
        ] {
            let json = serde_json::to_value(event_type).unwrap();
            assert_eq!(json, event_type.as_str());
        }
    }

    #[test]
    fn test_invite_events_belong_to_invites() {
        assert_eq!(EventType::InviteExpired.aggregate(), AggregateType::Invite);
        assert_eq!(EventType::DogCreated.aggregate().as_str(), "dog");
        assert_eq!(EventType::UserRegistered.aggregate(), AggregateType::User);
    }

    #[test]
    fn test_envelope_wraps_data_and_actor() {
        let actor = Uuid::new_v4();
        let event = DomainEvent::new(
            EventType::InviteCreated,
            Uuid::new_v4(),
            serde_json::json!({ "dog_id": Uuid::nil() }),
        )
        .by(actor);

        let envelope = event.envelope();
        assert_eq!(envelope["data"]["dog_id"], Uuid::nil().to_string());
        assert_eq!(envelope["metadata"]["actor_id"], actor.to_string());
        assert!(envelope["metadata"]["occurred_at"].is_string());
    }
}
