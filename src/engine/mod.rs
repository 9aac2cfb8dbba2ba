//! Progression and economy engine: reward math, XP caps and leveling curves,
//! the token economy, cosmetic unlocks, and deterministic session sequencing.
//! The store module owns persistence; reward and shuffle math stay pure so
//! the transactional paths can recompute them freely.

pub mod attempt;
pub mod catalog;
pub mod economy;
pub mod errors;
pub mod reward;
pub mod session;
pub mod shuffle;
pub mod store;
pub mod types;
pub mod unlocks;

pub use attempt::{deck_mastery_reached, AttemptOutcome};
pub use catalog::{CardCatalog, CardSummary, MemoryCatalog};
pub use economy::{power_up_price, PurchaseReceipt};
pub use errors::EngineError;
pub use reward::{calculate_reward, streak_bonus, RewardBreakdown};
pub use session::SessionView;
pub use shuffle::{shuffle_seed, shuffled_order, shuffled_subset, stable_hash};
pub use store::{ProgressStore, ProgressStoreBuilder};
pub use types::*;
pub use unlocks::{all_unlocks, unlock_for_level, CosmeticItem, UNLOCK_TABLE};
