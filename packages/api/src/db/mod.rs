//! # PostgreSQL persistence (`server` feature)
//!
//! - [`get_pool`] returns the process-wide pool, connecting on first use.
//! - [`PgStore`] implements [`store::MemberStore`] over the tables created by
//!   `migrations/0001_init.sql`.
//!
//! Accounts keep their profile fields as one JSONB document, so adding a profile field
//! never needs a migration.

#[cfg(feature = "server")]
mod pg;
#[cfg(feature = "server")]
mod pool;

#[cfg(feature = "server")]
pub use pg::PgStore;
#[cfg(feature = "server")]
pub use pool::get_pool;
