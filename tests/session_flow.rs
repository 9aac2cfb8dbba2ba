//! Session sequencing against a real store: quest tier walking, resume and
//! restart semantics, and remix subset lifecycle.

use chrono::Utc;
use deckforge::config::Config;
use deckforge::engine::{
    BloomTier, CardSummary, DeckProgress, EngineError, MemoryCatalog, ProgressStore, SessionRecord,
    StudyMode,
};
use tempfile::{tempdir, TempDir};

fn setup_store() -> (TempDir, ProgressStore) {
    let dir = tempdir().unwrap();
    let store = ProgressStore::open(dir.path()).unwrap();
    (dir, store)
}

/// Remember and Apply populated, the tiers in between empty.
fn sparse_catalog() -> MemoryCatalog {
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
fn quest_walks_tiers_and_skips_empty_ones() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    let view = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Quest, false)
        .unwrap();
    assert_eq!(view.record.tier, Some(BloomTier::Remember));
    assert_eq!(view.order.len(), 2);
    assert_eq!(view.record.total_cards, 3);
    assert!(view.current_card().is_some());

    let view = store
        .advance_session(&catalog, &config, "alice", "geo", StudyMode::Quest)
        .unwrap();
    assert_eq!(view.record.cursor, 1);
    assert_eq!(view.record.tier, Some(BloomTier::Remember));

    // Remember exhausted; Understand is empty, so Apply comes next.
    let view = store
        .advance_session(&catalog, &config, "alice", "geo", StudyMode::Quest)
        .unwrap();
    assert_eq!(view.record.tier, Some(BloomTier::Apply));
    assert_eq!(view.record.cursor, 0);
    assert_eq!(view.current_card(), Some("a1"));

    let view = store
        .advance_session(&catalog, &config, "alice", "geo", StudyMode::Quest)
        .unwrap();
    assert!(view.record.complete);
    assert!(view.current_card().is_none());
}

#[test]
fn quest_resume_restores_cursor_and_order() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    let first = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Quest, false)
        .unwrap();
    store
        .advance_session(&catalog, &config, "alice", "geo", StudyMode::Quest)
        .unwrap();

    let resumed = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Quest, false)
        .unwrap();
    assert_eq!(resumed.record.cursor, 1);
    assert_eq!(resumed.order, first.order);
}

#[test]
fn restart_resets_cursor_and_deck_streak() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    let mut progress = DeckProgress::new("geo", config.xp.deck_xp_base);
    progress.streak = 4;
    store.put_deck_progress("alice", &progress).unwrap();

    store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Quest, false)
        .unwrap();
    store
        .advance_session(&catalog, &config, "alice", "geo", StudyMode::Quest)
        .unwrap();

    let view = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Quest, true)
        .unwrap();
    assert_eq!(view.record.cursor, 0);
    assert_eq!(view.record.tier, Some(BloomTier::Remember));
    assert!(!view.record.complete);

    let progress = store.deck_progress("alice", "geo", &config.xp).unwrap();
    assert_eq!(progress.streak, 0);
}

#[test]
fn remix_completion_deals_a_fresh_subset_on_next_start() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    let view = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Remix, false)
        .unwrap();
    assert_eq!(view.order.len(), 3);
    assert_eq!(view.record.total_cards, 3);

    for _ in 0..3 {
        store
            .advance_session(&catalog, &config, "alice", "geo", StudyMode::Remix)
            .unwrap();
    }
    let persisted = store
        .session("alice", "geo", StudyMode::Remix)
        .unwrap()
        .unwrap();
    assert!(persisted.complete);
    assert!(persisted.ordering.is_empty());

    // Starting again after completion yields a fresh, incomplete subset.
    let view = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Remix, false)
        .unwrap();
    assert!(!view.record.complete);
    assert_eq!(view.record.cursor, 0);
    assert_eq!(view.order.len(), 3);
}

#[test]
fn remix_respects_subset_size_cap() {
    let (_dir, store) = setup_store();
    let mut config = Config::default();
    config.sessions.remix_size = 2;
    let catalog = sparse_catalog();

    let view = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Remix, false)
        .unwrap();
    assert_eq!(view.order.len(), 2);
    assert_eq!(view.record.total_cards, 2);
}

#[test]
fn remix_resume_filters_cards_no_longer_in_deck() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    let mut record = SessionRecord::new("geo", StudyMode::Remix, Utc::now());
    record.ordering = vec!["r1".into(), "ghost".into(), "a1".into()];
    record.total_cards = 3;
    store.put_session("alice", &record).unwrap();

    let view = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Remix, false)
        .unwrap();
    assert_eq!(view.order, vec!["r1".to_string(), "a1".to_string()]);
    assert_eq!(view.record.total_cards, 2);
}

#[test]
fn unknown_deck_is_fatal() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    let result =
        store.get_or_create_session(&catalog, &config, "alice", "atlantis", StudyMode::Quest, false);
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[test]
fn sessions_are_isolated_per_mode() {
    let (_dir, store) = setup_store();
    let config = Config::default();
    let catalog = sparse_catalog();

    store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Quest, false)
        .unwrap();
    store
        .advance_session(&catalog, &config, "alice", "geo", StudyMode::Quest)
        .unwrap();

    // A remix session for the same deck starts from scratch.
    let remix = store
        .get_or_create_session(&catalog, &config, "alice", "geo", StudyMode::Remix, false)
        .unwrap();
    assert_eq!(remix.record.cursor, 0);

    let quest = store
        .session("alice", "geo", StudyMode::Quest)
        .unwrap()
        .unwrap();
    assert_eq!(quest.cursor, 1);
}
