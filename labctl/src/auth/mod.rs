//! Request-scoped actor context.
//!
//! Identity verification lives in an upstream auth proxy; this module only
//! reads the trusted headers that proxy injects and turns them into an
//! explicit [`Actor`] handed to every handler. The service never consults
//! ambient or global identity state.

use crate::{errors::Error, AppState};
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Job function of the calling user, as asserted by the upstream proxy.
///
/// Managers and admins hold the management capability: publishing slots,
/// approving/rejecting bookings, bypassing the cancellation cutoff, and
/// forcing a sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Faculty,
    Student,
    Guest,
}

impl Role {
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Manager => write!(f, "manager"),
            Role::Faculty => write!(f, "faculty"),
            Role::Student => write!(f, "student"),
            Role::Guest => write!(f, "guest"),
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "faculty" => Ok(Role::Faculty),
            "student" => Ok(Role::Student),
            "guest" => Ok(Role::Guest),
            _ => Err(()),
        }
    }
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Actor {
    /// Capability check for management operations.
    pub fn require_manager(&self, action: &'static str) -> Result<(), Error> {
        if self.role.can_manage() {
            Ok(())
        } else {
            Err(Error::InsufficientRole { role: self.role, action })
        }
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|h| h.to_str().ok())
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cfg = &state.config.auth.proxy_header;

        let id = match header_value(parts, &cfg.id_header_name) {
            Some(raw) => raw.parse::<Uuid>().map_err(|_| Error::BadRequest {
                message: format!("Header {} is not a valid UUID", cfg.id_header_name),
            })?,
            None => return Err(Error::Unauthenticated { message: None }),
        };

        let email = match header_value(parts, &cfg.email_header_name) {
            Some(raw) if !raw.is_empty() => raw.to_string(),
            _ => return Err(Error::Unauthenticated { message: None }),
        };

        let role = match header_value(parts, &cfg.role_header_name) {
            Some(raw) => raw.parse::<Role>().map_err(|_| Error::BadRequest {
                message: format!("Header {} carries an unknown role", cfg.role_header_name),
            })?,
            None => return Err(Error::Unauthenticated { message: None }),
        };

        Ok(Actor { id, email, role })
    }
}
