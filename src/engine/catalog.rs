//! Card catalog collaborator. The engine only needs card identifiers and
//! bloom tiers; card content, formats, and rendering live elsewhere.

use std::collections::HashMap;

use crate::engine::errors::EngineError;
use crate::engine::types::BloomTier;

/// The slice of a flashcard the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSummary {
    pub id: String,
    pub tier: BloomTier,
}

impl CardSummary {
    pub fn new(id: &str, tier: BloomTier) -> Self {
        Self {
            id: id.to_string(),
            tier,
        }
    }
}

/// Provider of card identifiers per deck. A missing deck is fatal to the
/// operation, unlike missing progress documents which default in place.
pub trait CardCatalog {
    fn all_cards(&self, deck: &str) -> Result<Vec<CardSummary>, EngineError>;

    fn cards_by_tier(&self, deck: &str, tier: BloomTier) -> Result<Vec<CardSummary>, EngineError> {
        Ok(self
            .all_cards(deck)?
            .into_iter()
            .filter(|card| card.tier == tier)
            .collect())
    }

    /// The distinct tiers that have at least one card, in curriculum order.
    fn tiers_present(&self, deck: &str) -> Result<Vec<BloomTier>, EngineError> {
        let cards = self.all_cards(deck)?;
        Ok(BloomTier::ALL
            .iter()
            .copied()
            .filter(|tier| cards.iter().any(|card| card.tier == *tier))
            .collect())
    }
}

/// In-memory catalog used by tests and the CLI demo deck.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    decks: HashMap<String, Vec<CardSummary>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deck(mut self, deck: &str, cards: Vec<CardSummary>) -> Self {
        self.decks.insert(deck.to_string(), cards);
        self
    }

    /// A small fixed deck for local exploration via the CLI.
    pub fn demo() -> Self {
        let cards = vec![
            CardSummary::new("capital_fr", BloomTier::Remember),
            CardSummary::new("capital_de", BloomTier::Remember),
            CardSummary::new("capital_jp", BloomTier::Remember),
            CardSummary::new("border_count", BloomTier::Understand),
            CardSummary::new("climate_zones", BloomTier::Understand),
            CardSummary::new("map_reading", BloomTier::Apply),
            CardSummary::new("trade_routes", BloomTier::Analyze),
            CardSummary::new("policy_tradeoffs", BloomTier::Evaluate),
            CardSummary::new("design_itinerary", BloomTier::Create),
        ];
        Self::new().with_deck("geography", cards)
    }
}

impl CardCatalog for MemoryCatalog {
    fn all_cards(&self, deck: &str) -> Result<Vec<CardSummary>, EngineError> {
        self.decks
            .get(deck)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("deck: {}", deck)))
    }
}
