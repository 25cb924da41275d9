//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`InfrastructureId`]: a bookable piece of shared infrastructure
//! - [`SlotId`]: a published time window (claimed or unclaimed)
//! - [`BookingId`]: a claimed slot; the same underlying row as the slot it
//!   was claimed from, so the id space is shared with [`SlotId`]
//! - [`QuestionId`]: a per-infrastructure filter question
//! - [`AnswerId`]: one answer row attached to a booking

use uuid::Uuid;

pub type InfrastructureId = Uuid;
pub type SlotId = Uuid;
pub type BookingId = Uuid;
pub type QuestionId = Uuid;
pub type AnswerId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
