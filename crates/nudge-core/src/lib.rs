//! # nudge-core
//!
//! Core types, traits, configuration, phrasebook, and error handling for the Nudge bot.

pub mod config;
pub mod error;
pub mod message;
pub mod phrases;
pub mod traits;

pub use config::shellexpand;
