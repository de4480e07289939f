//! SQLite backend for the claim-drift engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements every
//! store trait; [`SqliteQueue`] shares its connection for pending rechecks.

mod encode;
mod queue;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use queue::SqliteQueue;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
