//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations over the slot lifecycle tables
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Repository Pattern
//!
//! Each repository wraps a `&mut PgConnection` and encapsulates all database
//! access for one entity type. Multi-statement operations open their own
//! transaction on that connection, so a caller holding a plain pool
//! connection still gets ACID behavior:
//!
//! ```ignore
//! let mut conn = pool.acquire().await?;
//! let mut slots = Slots::new(&mut conn);
//! let outcome = slots.request_booking(slot_id, &request).await?;
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/`
//! directory. The [`crate::migrator`] function provides access to the migrator.

pub mod errors;
pub mod handlers;
pub mod models;
