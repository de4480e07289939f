//! The longitudinal side of the engine.
//!
//! Posts enter through [`ingest_post`], which schedules re-evaluation of
//! their thread and, optionally, their claim group. The [`Scheduler`] drains
//! those requests, re-runs the rule engine over each unit, reconciles the
//! result against the active labels and hands every newly inserted label to
//! the emission [`Governor`]. [`batch`] runs the same rules over a file of
//! posts without touching any store.

pub mod batch;
pub mod config;
pub mod emitter;
pub mod error;
pub mod expiry;
pub mod governor;
pub mod ingest;
pub mod queue;
pub mod scheduler;

pub use config::{BudgetConfig, ClaimRecheckConfig, EmitConfig, RecheckConfig};
pub use emitter::AuditLog;
pub use error::{Error, Result};
pub use expiry::expire_stale_labels;
pub use governor::{EmitRecord, FlushOutcome, Governor};
pub use ingest::{IngestOutcome, ingest_post};
pub use queue::MemoryQueue;
pub use scheduler::{PassReport, Scheduler};
