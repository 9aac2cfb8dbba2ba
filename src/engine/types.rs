use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const ATTEMPT_SCHEMA_VERSION: u8 = 1;
pub const PROGRESS_SCHEMA_VERSION: u8 = 1;
pub const ECONOMY_SCHEMA_VERSION: u8 = 1;
pub const SESSION_SCHEMA_VERSION: u8 = 1;

/// Implemented by every persisted record so storage can reject documents
/// written under a different schema version instead of silently misreading
/// them.
pub(crate) trait VersionedRecord {
    const ENTITY: &'static str;
    const VERSION: u8;
    fn version(&self) -> u8;
}

macro_rules! versioned_record {
    ($type:ty, $entity:literal, $version:expr) => {
        impl VersionedRecord for $type {
            const ENTITY: &'static str = $entity;
            const VERSION: u8 = $version;
            fn version(&self) -> u8 {
                self.schema_version
            }
        }
    };
}

/// Multiplier applied to a deck's XP threshold after each level-up.
pub const DECK_THRESHOLD_GROWTH: f64 = 1.5;

/// Multiplier applied to the commander XP threshold after each level-up.
pub const COMMANDER_THRESHOLD_GROWTH: f64 = 2.0;

/// Commander levels divisible by this grant the one-time XP boost flag.
pub const XP_BOOST_LEVEL_INTERVAL: u32 = 5;

/// The six ordered cognitive levels assigned to every flashcard. The order is
/// the quest-mode curriculum order; the discriminant order matters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BloomTier {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomTier {
    /// All tiers in curriculum order.
    pub const ALL: [BloomTier; 6] = [
        BloomTier::Remember,
        BloomTier::Understand,
        BloomTier::Apply,
        BloomTier::Analyze,
        BloomTier::Evaluate,
        BloomTier::Create,
    ];

    /// Fixed base XP value awarded for a correct answer at this tier.
    pub fn base_xp(self) -> i64 {
        match self {
            BloomTier::Remember => 5,
            BloomTier::Understand => 8,
            BloomTier::Apply => 11,
            BloomTier::Analyze => 14,
            BloomTier::Evaluate => 17,
            BloomTier::Create => 20,
        }
    }

    /// The next tier in curriculum order, or `None` past `Create`.
    pub fn next(self) -> Option<BloomTier> {
        let idx = Self::ALL.iter().position(|t| *t == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BloomTier::Remember => "remember",
            BloomTier::Understand => "understand",
            BloomTier::Apply => "apply",
            BloomTier::Analyze => "analyze",
            BloomTier::Evaluate => "evaluate",
            BloomTier::Create => "create",
        }
    }
}

impl fmt::Display for BloomTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloomTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remember" => Ok(BloomTier::Remember),
            "understand" => Ok(BloomTier::Understand),
            "apply" => Ok(BloomTier::Apply),
            "analyze" => Ok(BloomTier::Analyze),
            "evaluate" => Ok(BloomTier::Evaluate),
            "create" => Ok(BloomTier::Create),
            other => Err(format!("unknown bloom tier: {}", other)),
        }
    }
}

/// Consumable power-ups purchasable with tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    /// Eliminate two wrong options on the current card.
    FiftyFifty,
    /// Re-answer the current card after a miss.
    Retry,
    /// Reveal a hint for the current card.
    Hint,
    /// Pause the timer during a timed drill.
    TimeFreeze,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::FiftyFifty,
        PowerUpKind::Retry,
        PowerUpKind::Hint,
        PowerUpKind::TimeFreeze,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PowerUpKind::FiftyFifty => "fifty_fifty",
            PowerUpKind::Retry => "retry",
            PowerUpKind::Hint => "hint",
            PowerUpKind::TimeFreeze => "time_freeze",
        }
    }
}

impl fmt::Display for PowerUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerUpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifty_fifty" | "5050" => Ok(PowerUpKind::FiftyFifty),
            "retry" => Ok(PowerUpKind::Retry),
            "hint" => Ok(PowerUpKind::Hint),
            "time_freeze" => Ok(PowerUpKind::TimeFreeze),
            other => Err(format!("unknown power-up: {}", other)),
        }
    }
}

/// Study flows that maintain a persisted cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    /// Tier-gated linear progression through the curriculum.
    Quest,
    /// Flat shuffled subset of the whole deck.
    Remix,
}

impl StudyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StudyMode::Quest => "quest",
            StudyMode::Remix => "remix",
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quest" => Ok(StudyMode::Quest),
            "remix" => Ok(StudyMode::Remix),
            other => Err(format!("unknown study mode: {}", other)),
        }
    }
}

/// One answered card. Append-only; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub user: String,
    pub deck: String,
    pub card: String,
    pub tier: BloomTier,
    pub was_correct: bool,
    pub answered_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl AttemptRecord {
    pub fn new(
        user: &str,
        deck: &str,
        card: &str,
        tier: BloomTier,
        was_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.to_string(),
            deck: deck.to_string(),
            card: card.to_string(),
            tier,
            was_correct,
            answered_at,
            schema_version: ATTEMPT_SCHEMA_VERSION,
        }
    }
}

/// Per-(user, deck) leveling state. Mutated only by attempt processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeckProgress {
    pub deck: String,
    pub level: u32,
    pub xp: i64,
    pub xp_to_next: i64,
    pub streak: u32,
    pub mastered: bool,
    pub mastered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl DeckProgress {
    pub fn new(deck: &str, xp_to_next: i64) -> Self {
        Self {
            deck: deck.to_string(),
            level: 1,
            xp: 0,
            xp_to_next,
            streak: 0,
            mastered: false,
            mastered_at: None,
            updated_at: Utc::now(),
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    /// Credit XP and apply as many level-ups as the amount clears. Returns the
    /// threshold value of each level that was crossed, in order, so the caller
    /// can compute commander spillover from the threshold in force at the
    /// moment of leveling.
    pub fn credit_xp(&mut self, amount: i64) -> Vec<i64> {
        self.xp += amount;
        let mut cleared = Vec::new();
        while self.xp >= self.xp_to_next {
            self.xp -= self.xp_to_next;
            cleared.push(self.xp_to_next);
            self.level += 1;
            self.xp_to_next = (self.xp_to_next as f64 * DECK_THRESHOLD_GROWTH).round() as i64;
        }
        self.updated_at = Utc::now();
        cleared
    }
}

/// Account-wide leveling state, one per user. Invariant: `xp < xp_to_next`
/// whenever the record is at rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommanderProgress {
    pub level: u32,
    pub xp: i64,
    pub xp_to_next: i64,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl CommanderProgress {
    pub fn new(xp_to_next: i64) -> Self {
        Self {
            level: 1,
            xp: 0,
            xp_to_next,
            updated_at: Utc::now(),
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    /// Credit XP; returns every level newly reached (usually empty or one).
    pub fn credit_xp(&mut self, amount: i64) -> Vec<u32> {
        self.xp += amount;
        let mut reached = Vec::new();
        while self.xp >= self.xp_to_next {
            self.xp -= self.xp_to_next;
            self.level += 1;
            self.xp_to_next = (self.xp_to_next as f64 * COMMANDER_THRESHOLD_GROWTH).round() as i64;
            reached.push(self.level);
        }
        self.updated_at = Utc::now();
        reached
    }
}

/// Session- and daily-window XP accounting, one per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct XpStats {
    pub session_xp: i64,
    pub session_start: DateTime<Utc>,
    pub daily_xp: i64,
    pub last_daily_reset: DateTime<Utc>,
    /// XP that exceeded the daily cap, banked instead of discarded.
    pub bonus_vault: i64,
    /// One-time flag set when the commander level crosses a boost interval;
    /// doubles raw XP until the next daily rollover.
    pub xp_boosted: bool,
    pub schema_version: u8,
}

impl XpStats {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_xp: 0,
            session_start: now,
            daily_xp: 0,
            last_daily_reset: now,
            bonus_vault: 0,
            xp_boosted: false,
            schema_version: ECONOMY_SCHEMA_VERSION,
        }
    }

    /// Roll the session and daily windows forward. The session tally resets
    /// after `idle_gap` of inactivity; `session_start` then tracks the most
    /// recent activity so an unbroken study run never expires mid-session.
    /// The daily tally resets on a UTC calendar-day change, which also clears
    /// the boost flag.
    pub fn roll_windows(&mut self, now: DateTime<Utc>, idle_gap: Duration) {
        if now.signed_duration_since(self.session_start) > idle_gap {
            self.session_xp = 0;
        }
        self.session_start = now;
        if now.date_naive() != self.last_daily_reset.date_naive() {
            self.daily_xp = 0;
            self.last_daily_reset = now;
            self.xp_boosted = false;
        }
    }
}

/// Token balance, one per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenWallet {
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl TokenWallet {
    pub fn new() -> Self {
        Self {
            balance: 0,
            updated_at: Utc::now(),
            schema_version: ECONOMY_SCHEMA_VERSION,
        }
    }
}

impl Default for TokenWallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-(user, deck) power-up purchase counts driving the escalating price.
/// Cleared when the player pays to skip a mastery gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseCounts {
    pub deck: String,
    pub counts: BTreeMap<PowerUpKind, u32>,
    pub schema_version: u8,
}

impl PurchaseCounts {
    pub fn new(deck: &str) -> Self {
        Self {
            deck: deck.to_string(),
            counts: BTreeMap::new(),
            schema_version: ECONOMY_SCHEMA_VERSION,
        }
    }

    pub fn count(&self, kind: PowerUpKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn bump(&mut self, kind: PowerUpKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }
}

/// Durable shop inventory, one per user. Unlike power-up purchase counts this
/// is never reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    pub items: BTreeMap<String, u32>,
    pub schema_version: u8,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            schema_version: ECONOMY_SCHEMA_VERSION,
        }
    }

    pub fn add(&mut self, item_id: &str, quantity: u32) {
        *self.items.entry(item_id.to_string()).or_insert(0) += quantity;
    }
}

/// Cosmetic items unlocked by commander level thresholds. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnlockedCustomizations {
    pub unlocked: Vec<String>,
    pub active: Option<String>,
    pub schema_version: u8,
}

impl UnlockedCustomizations {
    pub fn new() -> Self {
        Self {
            unlocked: Vec::new(),
            active: None,
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    /// Add an item id; returns false if it was already unlocked.
    pub fn add(&mut self, item_id: &str) -> bool {
        if self.unlocked.iter().any(|id| id == item_id) {
            return false;
        }
        self.unlocked.push(item_id.to_string());
        true
    }
}

impl Default for UnlockedCustomizations {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted cursor state for one (user, deck, mode). Quest sessions store
/// the active tier and re-derive their ordering from the stable seed; remix
/// sessions persist the realized subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub deck: String,
    pub mode: StudyMode,
    /// Active tier (quest mode only).
    pub tier: Option<BloomTier>,
    pub cursor: usize,
    /// Realized card order (remix mode only; cleared on completion).
    pub ordering: Vec<String>,
    pub total_cards: usize,
    pub complete: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

versioned_record!(AttemptRecord, "attempt", ATTEMPT_SCHEMA_VERSION);
versioned_record!(DeckProgress, "deck_progress", PROGRESS_SCHEMA_VERSION);
versioned_record!(CommanderProgress, "commander_progress", PROGRESS_SCHEMA_VERSION);
versioned_record!(XpStats, "xp_stats", ECONOMY_SCHEMA_VERSION);
versioned_record!(TokenWallet, "wallet", ECONOMY_SCHEMA_VERSION);
versioned_record!(PurchaseCounts, "purchase_counts", ECONOMY_SCHEMA_VERSION);
versioned_record!(Inventory, "inventory", ECONOMY_SCHEMA_VERSION);
versioned_record!(UnlockedCustomizations, "unlocks", PROGRESS_SCHEMA_VERSION);
versioned_record!(SessionRecord, "session", SESSION_SCHEMA_VERSION);

impl SessionRecord {
    pub fn new(deck: &str, mode: StudyMode, now: DateTime<Utc>) -> Self {
        Self {
            deck: deck.to_string(),
            mode,
            tier: None,
            cursor: 0,
            ordering: Vec::new(),
            total_cards: 0,
            complete: false,
            started_at: now,
            updated_at: now,
            schema_version: SESSION_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
