//! Database models for per-infrastructure filter questions.

use crate::types::{InfrastructureId, QuestionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A manager-defined form field a booking requester must answer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FilterQuestion {
    pub id: QuestionId,
    pub infrastructure_id: InfrastructureId,
    pub prompt: String,
    pub required: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Database request for creating a filter question
#[derive(Debug, Clone)]
pub struct FilterQuestionCreateDBRequest {
    pub infrastructure_id: InfrastructureId,
    pub prompt: String,
    pub required: bool,
    pub position: i32,
}
