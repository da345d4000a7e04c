#![forbid(unsafe_code)]

//! Core domain model and logic for the kcal wellness tracker.
//!
//! This crate provides:
//! - Domain types (profile, calorie entries, fasting state and history)
//! - Daily target derivation from the profile
//! - Day-scoped calorie summaries
//! - The fasting state machine and metabolic stages
//! - Persistence (keyed JSON records) and the `Tracker` state container
//! - A cancellable ticker for live displays, and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod profile;
pub mod ledger;
pub mod fasting;
pub mod store;
pub mod tracker;
pub mod ticker;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use profile::{compute_daily_target, effective_daily_target, DEFAULT_DAILY_TARGET};
pub use ledger::{summarize, DailySummary};
pub use fasting::{stage_for, FastingStage, FastingStatus, STAGES};
pub use store::{FileStore, MemoryStore, RecordStore};
pub use tracker::Tracker;
pub use ticker::Ticker;
