//! Orm: record access facade over one declared model, plus integrity checks.

mod crud;
mod integrity;
pub use crud::{Orm, DEFAULT_LIMIT, MAX_LIMIT};
