//! Pure reward math: per-tier base XP with weak-card and recency adjustments,
//! and the logistic streak bonus curve. Nothing here touches storage, so the
//! attempt transaction can recompute these freely on retry.

use chrono::{DateTime, Duration, Utc};

use crate::engine::types::{AttemptRecord, BloomTier};

/// Prior accuracy below this threshold earns the weak-card bonus.
const WEAK_CARD_THRESHOLD: f64 = 0.5;

/// A correct answer inside this window triggers the recency penalty.
const RECENCY_WINDOW_HOURS: i64 = 24;

/// Share of base XP deducted when the card was recently answered correctly.
const RECENCY_PENALTY_SHARE: f64 = 0.7;

const STREAK_MIN: u32 = 3;
const STREAK_MAX_BONUS: f64 = 100.0;
const STREAK_MIDPOINT: f64 = 6.0;
const STREAK_STEEPNESS: f64 = 0.5;

/// Independent components of a single reward. The streak bonus is computed
/// separately because it depends on deck state, not card history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardBreakdown {
    pub base: i64,
    pub weak_card_bonus: i64,
    /// Zero or negative.
    pub recency_penalty: i64,
}

impl RewardBreakdown {
    pub fn subtotal(&self) -> i64 {
        self.base + self.weak_card_bonus + self.recency_penalty
    }
}

/// Compute the reward components for answering a card of `tier` correctly,
/// given the full prior history of attempts on that exact card.
///
/// Deterministic for fixed inputs; `now` is threaded explicitly so tests can
/// pin the recency window.
pub fn calculate_reward(
    tier: BloomTier,
    prior: &[AttemptRecord],
    now: DateTime<Utc>,
) -> RewardBreakdown {
    let base = tier.base_xp();
    RewardBreakdown {
        base,
        weak_card_bonus: weak_card_bonus(base, prior),
        recency_penalty: recency_penalty(base, prior, now),
    }
}

/// Bonus for struggling cards: tapers linearly from 50% of base at 0% prior
/// accuracy down to nothing at the 50% threshold. A card with no history is
/// not weak, just new.
fn weak_card_bonus(base: i64, prior: &[AttemptRecord]) -> i64 {
    if prior.is_empty() {
        return 0;
    }
    let correct = prior.iter().filter(|a| a.was_correct).count() as f64;
    let accuracy = correct / prior.len() as f64;
    if accuracy >= WEAK_CARD_THRESHOLD {
        return 0;
    }
    let bonus = (base as f64 * (WEAK_CARD_THRESHOLD - accuracy)).round() as i64;
    bonus.max(0)
}

/// Penalty discouraging rapid re-answering of a card that was already
/// answered correctly inside the recency window.
fn recency_penalty(base: i64, prior: &[AttemptRecord], now: DateTime<Utc>) -> i64 {
    let window = Duration::hours(RECENCY_WINDOW_HOURS);
    let recent_correct = prior.iter().any(|a| {
        a.was_correct && now.signed_duration_since(a.answered_at) < window
    });
    if recent_correct {
        -((base as f64 * RECENCY_PENALTY_SHARE).round() as i64)
    } else {
        0
    }
}

/// Bonus XP for a consecutive-correct streak: zero below three, then a
/// logistic curve with midpoint at six, saturating at 100.
pub fn streak_bonus(streak: u32) -> i64 {
    if streak < STREAK_MIN {
        return 0;
    }
    let x = streak as f64;
    let value = STREAK_MAX_BONUS / (1.0 + (-STREAK_STEEPNESS * (x - STREAK_MIDPOINT)).exp());
    (value.round() as i64).clamp(0, STREAK_MAX_BONUS as i64)
}
