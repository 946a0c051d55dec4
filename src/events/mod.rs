//! Domain events recorded through a transactional outbox.

pub mod outbox;
pub mod types;

pub use outbox::OutboxService;
pub use types::{AggregateType, DomainEvent, EventMetadata, EventType};
