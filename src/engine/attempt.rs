//! Attempt processing: the one atomic read-modify-write cycle that turns an
//! answered card into XP, streaks, levels, tokens, unlocks, and mastery.
//!
//! Everything an answer touches (attempt append, deck and commander
//! progress, XP stats, wallet, unlocks) commits as a single sled multi-tree
//! transaction. Historical scans feeding pure computations run
//! outside the transaction; sled re-runs the closure on conflict, so nothing
//! inside it may have side effects beyond the transactional trees.

use chrono::{Duration, Utc};
use log::{debug, info};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::Transactional;

use crate::config::Config;
use crate::engine::catalog::CardCatalog;
use crate::engine::errors::EngineError;
use crate::engine::reward::{calculate_reward, streak_bonus, RewardBreakdown};
use crate::engine::store::{next_timestamp_nanos, ProgressStore};
use crate::engine::types::{
    AttemptRecord, BloomTier, CommanderProgress, DeckProgress, TokenWallet,
    UnlockedCustomizations, XpStats, XP_BOOST_LEVEL_INTERVAL,
};
use crate::engine::unlocks::{unlock_for_level, CosmeticItem};
use crate::logutil::escape_log;

/// Everything the UI layer needs to report after one answer.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub was_correct: bool,
    pub breakdown: RewardBreakdown,
    pub streak: u32,
    pub streak_bonus: i64,
    /// Pre-cap XP, after the boost doubling.
    pub raw_xp: i64,
    /// XP actually credited to deck and commander progress.
    pub awarded_xp: i64,
    /// XP diverted into the bonus vault by the daily cap.
    pub vaulted_xp: i64,
    pub deck_level: u32,
    pub deck_level_up: bool,
    pub commander_level: u32,
    pub commander_level_up: bool,
    pub unlocked: Vec<CosmeticItem>,
    pub deck_mastered: bool,
    pub awarded_tokens: i64,
}

impl AttemptOutcome {
    fn missed(breakdown: RewardBreakdown, deck_level: u32, commander_level: u32) -> Self {
        Self {
            was_correct: false,
            breakdown,
            streak: 0,
            streak_bonus: 0,
            raw_xp: 0,
            awarded_xp: 0,
            vaulted_xp: 0,
            deck_level,
            deck_level_up: false,
            commander_level,
            commander_level_up: false,
            unlocked: Vec::new(),
            deck_mastered: false,
            awarded_tokens: 0,
        }
    }
}

fn abort(err: EngineError) -> ConflictableTransactionError<EngineError> {
    ConflictableTransactionError::Abort(err)
}

/// True when every populated tier of the deck has rolling accuracy at or
/// above `required` across the given attempts, with at least one attempt on
/// each populated tier.
pub fn deck_mastery_reached(
    tiers_present: &[BloomTier],
    attempts: &[AttemptRecord],
    required: f64,
) -> bool {
    if tiers_present.is_empty() {
        return false;
    }
    tiers_present.iter().all(|tier| {
        let mut total = 0u32;
        let mut correct = 0u32;
        for attempt in attempts.iter().filter(|a| a.tier == *tier) {
            total += 1;
            if attempt.was_correct {
                correct += 1;
            }
        }
        total > 0 && f64::from(correct) / f64::from(total) >= required
    })
}

impl ProgressStore {
    /// Process one answered card. See the module docs for the transaction
    /// boundary; on store failure nothing is persisted and the caller owns
    /// the retry.
    #[allow(clippy::too_many_arguments)]
    pub fn log_attempt(
        &self,
        catalog: &dyn CardCatalog,
        config: &Config,
        user: &str,
        deck: &str,
        card: &str,
        tier: BloomTier,
        was_correct: bool,
    ) -> Result<AttemptOutcome, EngineError> {
        let now = Utc::now();
        let attempt = AttemptRecord::new(user, deck, card, tier, was_correct, now);
        let attempt_key = Self::attempt_key(&attempt, next_timestamp_nanos());
        let attempt_bytes = Self::encode(&attempt)?;

        // Historical context, gathered outside the transaction. Everything
        // derived from it below is pure, so a transaction retry reuses it
        // safely.
        let prior = self.attempts_for_card(user, deck, card)?;
        let breakdown = calculate_reward(tier, &prior, now);

        let mastery_candidate = if was_correct {
            let tiers = catalog.tiers_present(deck)?;
            let mut deck_attempts = self.attempts_for_deck(user, deck)?;
            deck_attempts.push(attempt.clone());
            deck_mastery_reached(&tiers, &deck_attempts, config.xp.mastery_accuracy)
        } else {
            false
        };

        let idle_gap = Duration::minutes(config.xp.session_idle_minutes);

        let outcome = (&self.progress, &self.attempts, &self.economy).transaction(
            |(progress, attempts, economy)| -> ConflictableTransactionResult<AttemptOutcome, EngineError> {
                attempts.insert(attempt_key.as_slice(), attempt_bytes.as_slice())?;

                let mut deck_progress = match progress.get(Self::deck_key(user, deck))? {
                    Some(bytes) => Self::decode::<DeckProgress>(&bytes).map_err(abort)?,
                    None => DeckProgress::new(deck, config.xp.deck_xp_base),
                };
                let mut commander = match progress.get(Self::commander_key(user))? {
                    Some(bytes) => Self::decode::<CommanderProgress>(&bytes).map_err(abort)?,
                    None => CommanderProgress::new(config.xp.commander_xp_base),
                };

                if !was_correct {
                    deck_progress.streak = 0;
                    deck_progress.updated_at = now;
                    progress.insert(
                        Self::deck_key(user, deck),
                        Self::encode(&deck_progress).map_err(abort)?,
                    )?;
                    return Ok(AttemptOutcome::missed(
                        breakdown,
                        deck_progress.level,
                        commander.level,
                    ));
                }

                deck_progress.streak += 1;
                let bonus = streak_bonus(deck_progress.streak);
                let mut raw = (breakdown.subtotal() + bonus).max(1);

                let mut stats = match progress.get(Self::stats_key(user))? {
                    Some(bytes) => Self::decode::<XpStats>(&bytes).map_err(abort)?,
                    None => XpStats::new(now),
                };
                stats.roll_windows(now, idle_gap);
                if stats.xp_boosted {
                    raw *= 2;
                }

                // Session cap: overflow is dampened to half value, never
                // discarded, and the session tally always absorbs the full
                // raw amount.
                let headroom = (config.xp.session_cap - stats.session_xp).max(0);
                let within_session = raw.min(headroom);
                let overflow = raw - within_session;
                let session_award = within_session + overflow / 2;
                stats.session_xp += raw;

                // Daily cap: overflow banks in the vault instead of feeding
                // progress.
                let daily_headroom = (config.xp.daily_cap - stats.daily_xp).max(0);
                let awarded = session_award.min(daily_headroom);
                let vaulted = session_award - awarded;
                stats.daily_xp += awarded;
                stats.bonus_vault += vaulted;

                let cleared = deck_progress.credit_xp(awarded);
                let spillover: i64 = cleared
                    .iter()
                    .map(|threshold| (*threshold as f64 * config.xp.spillover_share).round() as i64)
                    .sum();

                let reached = commander.credit_xp(awarded + spillover);

                let mut unlocked = Vec::new();
                let mut unlocks_doc: Option<UnlockedCustomizations> = None;
                for level in &reached {
                    if let Some(item) = unlock_for_level(*level) {
                        let mut doc = match unlocks_doc.take() {
                            Some(doc) => doc,
                            None => match progress.get(Self::unlocks_key(user))? {
                                Some(bytes) => {
                                    Self::decode::<UnlockedCustomizations>(&bytes).map_err(abort)?
                                }
                                None => UnlockedCustomizations::new(),
                            },
                        };
                        if doc.add(item.id) {
                            doc.active = Some(item.id.to_string());
                            unlocked.push(*item);
                        }
                        unlocks_doc = Some(doc);
                    }
                    if level % XP_BOOST_LEVEL_INTERVAL == 0 {
                        stats.xp_boosted = true;
                    }
                }

                let mut wallet = match economy.get(Self::wallet_key(user))? {
                    Some(bytes) => Self::decode::<TokenWallet>(&bytes).map_err(abort)?,
                    None => TokenWallet::new(),
                };
                let mut tokens = config.tokens.per_correct;
                let mut mastered_now = false;
                if mastery_candidate && !deck_progress.mastered {
                    deck_progress.mastered = true;
                    deck_progress.mastered_at = Some(now);
                    tokens += config.tokens.mastery_bonus;
                    mastered_now = true;
                }
                wallet.balance += tokens;
                wallet.updated_at = now;

                progress.insert(
                    Self::deck_key(user, deck),
                    Self::encode(&deck_progress).map_err(abort)?,
                )?;
                progress.insert(Self::stats_key(user), Self::encode(&stats).map_err(abort)?)?;
                progress.insert(
                    Self::commander_key(user),
                    Self::encode(&commander).map_err(abort)?,
                )?;
                if let Some(doc) = &unlocks_doc {
                    progress.insert(Self::unlocks_key(user), Self::encode(doc).map_err(abort)?)?;
                }
                economy.insert(Self::wallet_key(user), Self::encode(&wallet).map_err(abort)?)?;

                Ok(AttemptOutcome {
                    was_correct: true,
                    breakdown,
                    streak: deck_progress.streak,
                    streak_bonus: bonus,
                    raw_xp: raw,
                    awarded_xp: awarded,
                    vaulted_xp: vaulted,
                    deck_level: deck_progress.level,
                    deck_level_up: !cleared.is_empty(),
                    commander_level: commander.level,
                    commander_level_up: !reached.is_empty(),
                    unlocked,
                    deck_mastered: mastered_now,
                    awarded_tokens: tokens,
                })
            },
        )?;

        self.attempts.flush()?;
        self.progress.flush()?;
        self.economy.flush()?;

        debug!(
            "attempt logged: user={} deck={} card={} correct={} awarded={}",
            escape_log(user),
            escape_log(deck),
            escape_log(card),
            was_correct,
            outcome.awarded_xp
        );
        if outcome.deck_level_up {
            info!(
                "deck {} reached level {} for {}",
                escape_log(deck),
                outcome.deck_level,
                escape_log(user)
            );
        }
        for item in &outcome.unlocked {
            info!("{} unlocked cosmetic {}", escape_log(user), item.id);
        }
        if outcome.deck_mastered {
            info!("deck {} mastered by {}", escape_log(deck), escape_log(user));
        }

        Ok(outcome)
    }
}
