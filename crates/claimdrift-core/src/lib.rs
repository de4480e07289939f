//! Core types and trait definitions for the claim-drift engine.
//!
//! This crate is deliberately free of database and I/O dependencies. The
//! claims, rules and recheck crates build on these types; storage backends
//! implement the traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod claim;
pub mod emit;
pub mod error;
pub mod json;
pub mod label;
pub mod ledger;
pub mod post;
pub mod recheck;
pub mod store;
pub mod time;

pub use error::{Error, Result};
