//! Database models for booking answers.

use crate::api::models::bookings::{AnswerSubmission, AnswerValue};
use crate::types::{AnswerId, QuestionId, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One answered filter question, attached to a booking row.
///
/// Exactly one of `text_value`/`file_ref` is set; the check constraint on the
/// table enforces the exclusivity the [`AnswerValue`] union expresses in code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: AnswerId,
    pub slot_id: SlotId,
    pub question_id: QuestionId,
    pub text_value: Option<String>,
    pub file_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Answer {
    pub fn value(&self) -> AnswerValue {
        match (&self.text_value, &self.file_ref) {
            (Some(text), _) => AnswerValue::Text { value: text.clone() },
            (None, Some(file_ref)) => AnswerValue::File { file_ref: file_ref.clone() },
            // Unreachable under the answers_one_value constraint
            (None, None) => AnswerValue::Text { value: String::new() },
        }
    }
}

/// Database request for persisting one answer
#[derive(Debug, Clone)]
pub struct AnswerCreateDBRequest {
    pub question_id: QuestionId,
    pub text_value: Option<String>,
    pub file_ref: Option<String>,
}

impl From<AnswerSubmission> for AnswerCreateDBRequest {
    fn from(api: AnswerSubmission) -> Self {
        match api.answer {
            AnswerValue::Text { value } => Self {
                question_id: api.question_id,
                text_value: Some(value),
                file_ref: None,
            },
            AnswerValue::File { file_ref } => Self {
                question_id: api.question_id,
                text_value: None,
                file_ref: Some(file_ref),
            },
        }
    }
}
