//! Database models matching table schemas.

pub mod answers;
pub mod infrastructures;
pub mod questions;
pub mod slots;
