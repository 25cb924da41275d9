//! API request/response models for slots.

use crate::db::models::slots::{BatchCreateDBRequest, Slot, SlotCreateDBRequest, SlotKind, SlotStatus};
use crate::types::{InfrastructureId, SlotId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for publishing a single timeslot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlotCreate {
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl SlotCreate {
    pub fn into_db_request(self, infrastructure_id: InfrastructureId) -> SlotCreateDBRequest {
        SlotCreateDBRequest {
            infrastructure_id,
            booking_date: self.booking_date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Request body for batch timeslot generation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchSlotCreate {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_start_time: NaiveTime,
    pub slot_duration_minutes: i64,
    pub slots_per_day: i64,
}

impl BatchSlotCreate {
    pub fn into_db_request(self, infrastructure_id: InfrastructureId) -> BatchCreateDBRequest {
        BatchCreateDBRequest {
            infrastructure_id,
            start_date: self.start_date,
            end_date: self.end_date,
            daily_start_time: self.daily_start_time,
            slot_duration_minutes: self.slot_duration_minutes,
            slots_per_day: self.slots_per_day,
        }
    }
}

/// Outcome of a batch generation call: candidates that passed the overlap
/// check vs. candidates skipped because an active row already covered them
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchCreateResponse {
    pub created: u64,
    pub skipped: u64,
}

/// Query parameters for listing available slots
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSlotsQuery {
    /// Restrict the listing to a single calendar date
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlotResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SlotId,
    #[schema(value_type = String, format = "uuid")]
    pub infrastructure_id: InfrastructureId,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub kind: SlotKind,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Slot> for SlotResponse {
    fn from(slot: Slot) -> Self {
        Self {
            id: slot.id,
            infrastructure_id: slot.infrastructure_id,
            booking_date: slot.booking_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            kind: slot.kind,
            status: slot.status,
            user_email: slot.user_email,
            purpose: slot.purpose,
            created_at: slot.created_at,
            updated_at: slot.updated_at,
        }
    }
}
