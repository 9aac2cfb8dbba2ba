//! Session sequencing: the per-(user, deck, mode) cursor that decides which
//! card is shown next.
//!
//! Quest mode walks the bloom tiers in curriculum order, skipping tiers with
//! no cards. Each tier's ordering is re-derived on demand from the stable
//! (user, deck, tier) seed, so only the tier and cursor need persisting and a
//! crash resumes exactly where it left off. Remix mode persists one shuffled
//! subset and walks it flat.
//!
//! Sequencing is deliberately independent of attempt processing: a lost race
//! between "advance cursor" and "log attempt" only affects presentation
//! order, never reward correctness.

use chrono::Utc;
use log::warn;
use std::collections::HashSet;

use crate::config::Config;
use crate::engine::catalog::CardCatalog;
use crate::engine::errors::EngineError;
use crate::engine::shuffle::{shuffle_seed, shuffled_order, shuffled_subset};
use crate::engine::store::{next_timestamp_nanos, ProgressStore};
use crate::engine::types::{BloomTier, SessionRecord, StudyMode};
use crate::logutil::escape_log;

/// A session record together with the realized order of its active segment
/// (the current tier in quest mode, the whole subset in remix mode).
#[derive(Debug, Clone)]
pub struct SessionView {
    pub record: SessionRecord,
    pub order: Vec<String>,
}

impl SessionView {
    /// The card the user should see next, or `None` once complete.
    pub fn current_card(&self) -> Option<&str> {
        if self.record.complete {
            return None;
        }
        self.order.get(self.record.cursor).map(String::as_str)
    }
}

/// Deterministic ordering for one quest tier.
fn tier_order(
    catalog: &dyn CardCatalog,
    user: &str,
    deck: &str,
    tier: BloomTier,
) -> Result<Vec<String>, EngineError> {
    let ids: Vec<String> = catalog
        .cards_by_tier(deck, tier)?
        .into_iter()
        .map(|card| card.id)
        .collect();
    Ok(shuffled_order(&ids, shuffle_seed(user, deck, tier.as_str())))
}

/// First tier at or after `from` that has cards, with its ordering.
fn first_populated_tier(
    catalog: &dyn CardCatalog,
    user: &str,
    deck: &str,
    from: Option<BloomTier>,
) -> Result<Option<(BloomTier, Vec<String>)>, EngineError> {
    let mut tier = from;
    while let Some(current) = tier {
        let order = tier_order(catalog, user, deck, current)?;
        if !order.is_empty() {
            return Ok(Some((current, order)));
        }
        tier = current.next();
    }
    Ok(None)
}

impl ProgressStore {
    /// Fetch the active session for (user, deck, mode), creating one when
    /// absent. `restart` discards any persisted session, resets the cursor
    /// to the beginning, and resets the deck streak.
    pub fn get_or_create_session(
        &self,
        catalog: &dyn CardCatalog,
        config: &Config,
        user: &str,
        deck: &str,
        mode: StudyMode,
        restart: bool,
    ) -> Result<SessionView, EngineError> {
        if restart {
            self.clear_session(user, deck, mode)?;
            let mut progress = self.deck_progress(user, deck, &config.xp)?;
            progress.streak = 0;
            self.put_deck_progress(user, &progress)?;
            return self.create_session(catalog, config, user, deck, mode);
        }

        let existing = match self.session(user, deck, mode) {
            Ok(existing) => existing,
            Err(EngineError::MalformedSession(reason)) => {
                warn!(
                    "rebuilding session for {} deck {}: {}",
                    escape_log(user),
                    escape_log(deck),
                    reason
                );
                None
            }
            Err(err) => return Err(err),
        };

        match existing {
            Some(record) => self.resume_session(catalog, config, user, record),
            None => self.create_session(catalog, config, user, deck, mode),
        }
    }

    /// Move the cursor past the current card, transitioning tiers (quest) or
    /// completing the session (both modes) when the ordering runs out.
    pub fn advance_session(
        &self,
        catalog: &dyn CardCatalog,
        config: &Config,
        user: &str,
        deck: &str,
        mode: StudyMode,
    ) -> Result<SessionView, EngineError> {
        let mut view = self.get_or_create_session(catalog, config, user, deck, mode, false)?;
        if view.record.complete {
            return Ok(view);
        }
        view.record.cursor += 1;

        match mode {
            StudyMode::Quest => {
                if view.record.cursor >= view.order.len() {
                    let next = view.record.tier.and_then(BloomTier::next);
                    match first_populated_tier(catalog, user, deck, next)? {
                        Some((tier, order)) => {
                            view.record.tier = Some(tier);
                            view.record.cursor = 0;
                            view.order = order;
                        }
                        None => {
                            view.record.complete = true;
                            view.order.clear();
                        }
                    }
                }
            }
            StudyMode::Remix => {
                if view.record.cursor >= view.record.ordering.len() {
                    // Completion clears the persisted subset so the next
                    // start generates a fresh one.
                    view.record.complete = true;
                    view.record.ordering.clear();
                    view.order.clear();
                }
            }
        }

        view.record.touch();
        self.put_session(user, &view.record)?;
        Ok(view)
    }

    fn create_session(
        &self,
        catalog: &dyn CardCatalog,
        config: &Config,
        user: &str,
        deck: &str,
        mode: StudyMode,
    ) -> Result<SessionView, EngineError> {
        let now = Utc::now();
        let mut record = SessionRecord::new(deck, mode, now);
        let order = match mode {
            StudyMode::Quest => {
                record.total_cards = catalog.all_cards(deck)?.len();
                match first_populated_tier(catalog, user, deck, Some(BloomTier::Remember))? {
                    Some((tier, order)) => {
                        record.tier = Some(tier);
                        order
                    }
                    None => {
                        record.complete = true;
                        Vec::new()
                    }
                }
            }
            StudyMode::Remix => {
                let ids: Vec<String> = catalog
                    .all_cards(deck)?
                    .into_iter()
                    .map(|card| card.id)
                    .collect();
                let seed = shuffle_seed(user, deck, &format!("remix:{}", next_timestamp_nanos()));
                record.ordering = shuffled_subset(&ids, seed, config.sessions.remix_size);
                record.total_cards = record.ordering.len();
                if record.ordering.is_empty() {
                    record.complete = true;
                }
                record.ordering.clone()
            }
        };
        self.put_session(user, &record)?;
        Ok(SessionView { record, order })
    }

    fn resume_session(
        &self,
        catalog: &dyn CardCatalog,
        config: &Config,
        user: &str,
        mut record: SessionRecord,
    ) -> Result<SessionView, EngineError> {
        if record.complete {
            // A finished remix session is terminal; starting again deals a
            // fresh subset. A finished quest stays complete until the caller
            // explicitly restarts.
            if record.mode == StudyMode::Remix {
                let deck = record.deck.clone();
                return self.create_session(catalog, config, user, &deck, StudyMode::Remix);
            }
            return Ok(SessionView {
                record,
                order: Vec::new(),
            });
        }
        let deck = record.deck.clone();

        match record.mode {
            StudyMode::Quest => {
                let tier = record.tier.unwrap_or(BloomTier::Remember);
                let mut order = tier_order(catalog, user, &deck, tier)?;
                if record.cursor >= order.len() {
                    // The persisted tier emptied or shrank under the cursor;
                    // move on to the next populated tier.
                    match first_populated_tier(catalog, user, &deck, tier.next())? {
                        Some((next_tier, next_order)) => {
                            record.tier = Some(next_tier);
                            record.cursor = 0;
                            order = next_order;
                        }
                        None => {
                            record.complete = true;
                            order.clear();
                        }
                    }
                    record.touch();
                    self.put_session(user, &record)?;
                }
                Ok(SessionView { record, order })
            }
            StudyMode::Remix => {
                let valid: HashSet<String> = catalog
                    .all_cards(&deck)?
                    .into_iter()
                    .map(|card| card.id)
                    .collect();
                let filtered: Vec<String> = record
                    .ordering
                    .iter()
                    .filter(|id| valid.contains(*id))
                    .cloned()
                    .collect();
                if filtered.len() != record.ordering.len() {
                    warn!(
                        "filtered {} stale cards from remix session for deck {}",
                        record.ordering.len() - filtered.len(),
                        escape_log(&deck)
                    );
                    record.ordering = filtered;
                    record.total_cards = record.ordering.len();
                    record.cursor = record.cursor.min(record.ordering.len());
                }
                if record.ordering.is_empty() {
                    // Every persisted card vanished from the deck; start over.
                    return self.create_session(catalog, config, user, &deck, StudyMode::Remix);
                }
                if record.cursor >= record.ordering.len() {
                    record.complete = true;
                    record.ordering.clear();
                }
                record.touch();
                self.put_session(user, &record)?;
                let order = record.ordering.clone();
                Ok(SessionView { record, order })
            }
        }
    }
}
