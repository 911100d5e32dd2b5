//! # nudge-memory
//!
//! Persistent reminder state for Nudge (SQLite-backed).

pub mod store;

pub use store::{Store, UserState};
