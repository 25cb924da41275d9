//! API request/response models for bookings.

use crate::api::models::slots::SlotResponse;
use crate::db::models::answers::Answer;
use crate::db::models::slots::Slot;
use crate::types::{QuestionId, SlotId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A filter-question answer: either inline text or a reference to a stored
/// file. Tagged so a value is never "sometimes a path, sometimes text".
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerValue {
    Text { value: String },
    File { file_ref: String },
}

impl AnswerValue {
    /// Blank answers do not satisfy a required question.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text { value } => value.trim().is_empty(),
            AnswerValue::File { file_ref } => file_ref.trim().is_empty(),
        }
    }
}

/// One submitted answer in a booking request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerSubmission {
    #[schema(value_type = String, format = "uuid")]
    pub question_id: QuestionId,
    pub answer: AnswerValue,
}

/// Request body for claiming a timeslot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingRequest {
    pub purpose: String,
    #[serde(default)]
    pub answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub question_id: QuestionId,
    pub answer: AnswerValue,
}

impl From<Answer> for AnswerResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.value(),
            question_id: answer.question_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub slot: SlotResponse,
    pub answers: Vec<AnswerResponse>,
}

impl BookingResponse {
    pub fn new(slot: Slot, answers: Vec<Answer>) -> Self {
        Self {
            slot: SlotResponse::from(slot),
            answers: answers.into_iter().map(AnswerResponse::from).collect(),
        }
    }
}

/// Response to a rejection: the terminal booking plus the id of the
/// freshly re-offered timeslot covering the identical window
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RejectResponse {
    pub booking: SlotResponse,
    #[schema(value_type = String, format = "uuid")]
    pub new_slot_id: SlotId,
}

/// Response to a sweep invocation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    pub updated_count: u64,
}
