//! End-to-end attempt processing: reward math through caps, leveling,
//! spillover, unlocks, boost, and mastery, all against a real sled store.

use chrono::Utc;
use deckforge::config::Config;
use deckforge::engine::{
    BloomTier, CardSummary, CommanderProgress, DeckProgress, MemoryCatalog, ProgressStore, XpStats,
};
use tempfile::{tempdir, TempDir};

fn setup_store() -> (TempDir, ProgressStore) {
    let dir = tempdir().unwrap();
    let store = ProgressStore::open(dir.path()).unwrap();
    (dir, store)
}

/// Two populated tiers so a single correct answer can never master the deck.
fn two_tier_catalog() -> MemoryCatalog {
    MemoryCatalog::new().with_deck(
        "geo",
        vec![
            CardSummary::new("r1", BloomTier::Remember),
            CardSummary::new("r2", BloomTier::Remember),
            CardSummary::new("a1", BloomTier::Apply),
        ],
    )
}

#[test]
fn first_correct_answer_awards_base_xp_and_tokens() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = two_tier_catalog();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "r1", BloomTier::Remember, true)
        .unwrap();

    assert!(outcome.was_correct);
    assert_eq!(outcome.breakdown.base, 5);
    assert_eq!(outcome.breakdown.weak_card_bonus, 0);
    assert_eq!(outcome.breakdown.recency_penalty, 0);
    assert_eq!(outcome.streak, 1);
    assert_eq!(outcome.streak_bonus, 0);
    assert_eq!(outcome.awarded_xp, 5);
    assert_eq!(outcome.awarded_tokens, config.tokens.per_correct);
    assert!(!outcome.deck_mastered);

    let progress = store.deck_progress("alice", "geo", &config.xp).unwrap();
    assert_eq!(progress.xp, 5);
    assert_eq!(progress.streak, 1);
    assert_eq!(store.token_balance("alice").unwrap(), 5);

    let attempts = store.attempts_for_card("alice", "geo", "r1").unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].was_correct);
}

#[test]
fn wrong_answer_resets_streak_and_awards_nothing() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = two_tier_catalog();

    store
        .log_attempt(&catalog, &config, "alice", "geo", "r1", BloomTier::Remember, true)
        .unwrap();
    store
        .log_attempt(&catalog, &config, "alice", "geo", "r2", BloomTier::Remember, true)
        .unwrap();
    let balance_before = store.token_balance("alice").unwrap();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "a1", BloomTier::Apply, false)
        .unwrap();

    assert!(!outcome.was_correct);
    assert_eq!(outcome.streak, 0);
    assert_eq!(outcome.awarded_xp, 0);
    assert_eq!(outcome.awarded_tokens, 0);

    let progress = store.deck_progress("alice", "geo", &config.xp).unwrap();
    assert_eq!(progress.streak, 0);
    assert_eq!(store.token_balance("alice").unwrap(), balance_before);

    // The miss is still recorded in history.
    let attempts = store.attempts_for_deck("alice", "geo").unwrap();
    assert_eq!(attempts.len(), 3);
}

#[test]
fn session_cap_halves_overflow_but_session_tally_absorbs_raw() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = MemoryCatalog::new().with_deck(
        "geo",
        vec![
            CardSummary::new("c1", BloomTier::Create),
            CardSummary::new("r1", BloomTier::Remember),
        ],
    );

    // Session window already at the cap, daily window wide open.
    let mut stats = XpStats::new(Utc::now());
    stats.session_xp = config.xp.session_cap;
    store.put_xp_stats("alice", &stats).unwrap();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "c1", BloomTier::Create, true)
        .unwrap();

    // Raw 20 past the cap lands at half value.
    assert_eq!(outcome.raw_xp, 20);
    assert_eq!(outcome.awarded_xp, 10);
    assert_eq!(outcome.vaulted_xp, 0);

    let stats = store.xp_stats("alice").unwrap();
    assert_eq!(stats.session_xp, config.xp.session_cap + 20);
    assert_eq!(stats.daily_xp, 10);
}

#[test]
fn daily_cap_banks_overflow_in_vault() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = MemoryCatalog::new().with_deck(
        "geo",
        vec![
            CardSummary::new("c1", BloomTier::Create),
            CardSummary::new("r1", BloomTier::Remember),
        ],
    );

    let mut stats = XpStats::new(Utc::now());
    stats.daily_xp = config.xp.daily_cap - 5;
    store.put_xp_stats("alice", &stats).unwrap();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "c1", BloomTier::Create, true)
        .unwrap();

    assert_eq!(outcome.raw_xp, 20);
    assert_eq!(outcome.awarded_xp, 5);
    assert_eq!(outcome.vaulted_xp, 15);

    let stats = store.xp_stats("alice").unwrap();
    assert_eq!(stats.daily_xp, config.xp.daily_cap);
    assert_eq!(stats.bonus_vault, 15);

    // Only the capped award reached deck progress.
    let progress = store.deck_progress("alice", "geo", &config.xp).unwrap();
    assert_eq!(progress.xp, 5);
}

#[test]
fn deck_level_up_spills_to_commander() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = MemoryCatalog::new().with_deck(
        "geo",
        vec![
            CardSummary::new("c1", BloomTier::Create),
            CardSummary::new("r1", BloomTier::Remember),
        ],
    );

    let mut progress = DeckProgress::new("geo", config.xp.deck_xp_base);
    progress.xp = 90;
    store.put_deck_progress("alice", &progress).unwrap();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "c1", BloomTier::Create, true)
        .unwrap();

    assert!(outcome.deck_level_up);
    assert_eq!(outcome.deck_level, 2);

    let progress = store.deck_progress("alice", "geo", &config.xp).unwrap();
    assert_eq!(progress.level, 2);
    assert_eq!(progress.xp, 10);
    assert_eq!(progress.xp_to_next, 150);

    // Commander got the award plus 75% of the cleared 100-point threshold.
    let commander = store.commander_progress("alice", &config.xp).unwrap();
    assert_eq!(commander.level, 1);
    assert_eq!(commander.xp, 20 + 75);
}

#[test]
fn commander_level_up_unlocks_cosmetic() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = two_tier_catalog();

    let mut commander = CommanderProgress::new(config.xp.commander_xp_base);
    commander.xp = 95;
    store.put_commander_progress("alice", &commander).unwrap();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "r1", BloomTier::Remember, true)
        .unwrap();

    assert!(outcome.commander_level_up);
    assert_eq!(outcome.commander_level, 2);
    assert_eq!(outcome.unlocked.len(), 1);
    assert_eq!(outcome.unlocked[0].id, "frame_recruit");

    let unlocks = store.unlocks("alice").unwrap();
    assert_eq!(unlocks.unlocked, vec!["frame_recruit".to_string()]);
    assert_eq!(unlocks.active.as_deref(), Some("frame_recruit"));

    let commander = store.commander_progress("alice", &config.xp).unwrap();
    assert_eq!(commander.level, 2);
    assert_eq!(commander.xp_to_next, config.xp.commander_xp_base * 2);
}

#[test]
fn boost_interval_doubles_raw_xp_on_later_answers() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = two_tier_catalog();

    // One short step away from commander level 5.
    let mut commander = CommanderProgress::new(config.xp.commander_xp_base);
    commander.level = 4;
    commander.xp = 9;
    commander.xp_to_next = 10;
    store.put_commander_progress("alice", &commander).unwrap();

    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "r1", BloomTier::Remember, true)
        .unwrap();
    assert_eq!(outcome.commander_level, 5);
    assert!(store.xp_stats("alice").unwrap().xp_boosted);

    // The boost applies to subsequent answers until the daily rollover.
    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "r2", BloomTier::Remember, true)
        .unwrap();
    assert_eq!(outcome.raw_xp, 10);
    assert_eq!(outcome.awarded_xp, 10);
}

#[test]
fn mastery_bonus_is_awarded_exactly_once() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = MemoryCatalog::new()
        .with_deck("mini", vec![CardSummary::new("m1", BloomTier::Remember)]);

    // First correct answer: 100% accuracy on the only populated tier.
    let outcome = store
        .log_attempt(&catalog, &config, "alice", "mini", "m1", BloomTier::Remember, true)
        .unwrap();
    assert!(outcome.deck_mastered);
    assert_eq!(
        outcome.awarded_tokens,
        config.tokens.per_correct + config.tokens.mastery_bonus
    );

    // Still mastered; no second bonus.
    let outcome = store
        .log_attempt(&catalog, &config, "alice", "mini", "m1", BloomTier::Remember, true)
        .unwrap();
    assert!(!outcome.deck_mastered);
    assert_eq!(outcome.awarded_tokens, config.tokens.per_correct);

    let progress = store.deck_progress("alice", "mini", &config.xp).unwrap();
    assert!(progress.mastered);
    assert!(progress.mastered_at.is_some());
    assert_eq!(
        store.token_balance("alice").unwrap(),
        2 * config.tokens.per_correct + config.tokens.mastery_bonus
    );
}

#[test]
fn colon_in_card_id_does_not_leak_history_into_sibling_cards() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = MemoryCatalog::new().with_deck(
        "geo",
        vec![
            CardSummary::new("x", BloomTier::Remember),
            CardSummary::new("x:y", BloomTier::Remember),
            CardSummary::new("a1", BloomTier::Apply),
        ],
    );

    store
        .log_attempt(&catalog, &config, "alice", "geo", "x:y", BloomTier::Remember, true)
        .unwrap();
    assert!(store.attempts_for_card("alice", "geo", "x").unwrap().is_empty());

    // Card "x" is brand new: full base, no recency penalty from "x:y".
    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "x", BloomTier::Remember, true)
        .unwrap();
    assert_eq!(outcome.breakdown.recency_penalty, 0);
    assert_eq!(outcome.breakdown.weak_card_bonus, 0);
    assert_eq!(outcome.awarded_xp, 5);

    assert_eq!(store.attempts_for_card("alice", "geo", "x").unwrap().len(), 1);
    assert_eq!(store.attempts_for_card("alice", "geo", "x:y").unwrap().len(), 1);
}

#[test]
fn repeat_within_recency_window_floors_at_one_xp() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = two_tier_catalog();

    store
        .log_attempt(&catalog, &config, "alice", "geo", "r1", BloomTier::Remember, true)
        .unwrap();
    let outcome = store
        .log_attempt(&catalog, &config, "alice", "geo", "r1", BloomTier::Remember, true)
        .unwrap();

    // Base 5 minus the recency penalty, never below the 1 XP floor.
    assert!(outcome.breakdown.recency_penalty < 0);
    assert_eq!(outcome.awarded_xp, 1);
}
