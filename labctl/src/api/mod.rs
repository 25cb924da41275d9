//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! The REST surface lives under `/api/v1` and is documented with OpenAPI
//! annotations via `utoipa`; interactive docs are served at `/docs`.

pub mod handlers;
pub mod models;
