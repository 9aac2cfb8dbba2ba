//! # Deckforge - Progression Engine for Flashcard Study
//!
//! Deckforge is the progression-and-economy core of a gamified flashcard
//! study application: experience points with session and daily caps, per-deck
//! and account-wide ("commander") leveling curves, a token economy with
//! escalating power-up prices, threshold-based cosmetic unlocks, and
//! deterministic study-session sequencing ("quest" tier progression and
//! "remix" shuffled subsets).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deckforge::config::Config;
//! use deckforge::engine::types::BloomTier;
//! use deckforge::engine::{MemoryCatalog, ProgressStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let store = ProgressStore::open(&config.storage.data_dir)?;
//!     let catalog = MemoryCatalog::demo();
//!
//!     let outcome = store.log_attempt(
//!         &catalog,
//!         &config,
//!         "alice",
//!         "geography",
//!         "capital_fr",
//!         BloomTier::Remember,
//!         true,
//!     )?;
//!     println!("awarded {} XP", outcome.awarded_xp);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - Reward math, attempt processing, economy, sessions, storage
//! - [`config`] - Tuning knobs with TOML persistence and validation
//! - [`logutil`] - Log sanitization helpers
//!
//! ## Architecture
//!
//! A UI event ("card answered") calls [`engine::store::ProgressStore::log_attempt`],
//! which runs reward computation and commits every resulting state change as
//! one sled transaction. Power-up and shop purchases go through the economy
//! operations independently. Session sequencing keeps its own cursor
//! documents and never participates in attempt transactions.

pub mod config;
pub mod engine;
pub mod logutil;
