//! Database models for the infrastructure registry.
//!
//! Infrastructures are provisioned out-of-band; the service only needs them
//! as the anchor for slots and filter questions.

use crate::types::InfrastructureId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Infrastructure {
    pub id: InfrastructureId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Database request for registering an infrastructure
#[derive(Debug, Clone)]
pub struct InfrastructureCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
}
