use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info};

use crate::config::XpConfig;
use crate::engine::errors::EngineError;
use crate::engine::types::{
    AttemptRecord, CommanderProgress, DeckProgress, Inventory, PurchaseCounts, SessionRecord,
    StudyMode, TokenWallet, UnlockedCustomizations, VersionedRecord, XpStats,
};

const TREE_PROGRESS: &str = "deckforge_progress";
const TREE_ATTEMPTS: &str = "deckforge_attempts";
const TREE_ECONOMY: &str = "deckforge_economy";
const TREE_SESSIONS: &str = "deckforge_sessions";

pub(crate) fn next_timestamp_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000)
}

/// Escape a user-supplied identifier for use inside a ':'-delimited composite
/// key. Without this, card "x" would prefix-match the attempts of card "x:y".
fn key_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            c => out.push(c),
        }
    }
    out
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct ProgressStoreBuilder {
    path: PathBuf,
}

impl ProgressStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<ProgressStore, EngineError> {
        ProgressStore::open(self.path)
    }
}

/// Sled-backed persistence for progression, attempts, economy, and session
/// state. Attempt processing and purchases run as multi-tree transactions;
/// sled owns retry-on-conflict, so a committed operation is all-or-nothing.
pub struct ProgressStore {
    _db: sled::Db,
    pub(crate) progress: sled::Tree,
    pub(crate) attempts: sled::Tree,
    pub(crate) economy: sled::Tree,
    pub(crate) sessions: sled::Tree,
}

impl ProgressStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let progress = db.open_tree(TREE_PROGRESS)?;
        let attempts = db.open_tree(TREE_ATTEMPTS)?;
        let economy = db.open_tree(TREE_ECONOMY)?;
        let sessions = db.open_tree(TREE_SESSIONS)?;
        info!("progress store opened at {}", path_ref.display());
        Ok(Self {
            _db: db,
            progress,
            attempts,
            economy,
            sessions,
        })
    }

    // ------------------------------------------------------------------
    // Key layout
    // ------------------------------------------------------------------

    pub(crate) fn deck_key(user: &str, deck: &str) -> Vec<u8> {
        format!("deck:{}:{}", key_segment(user), key_segment(deck)).into_bytes()
    }

    pub(crate) fn commander_key(user: &str) -> Vec<u8> {
        format!("commander:{}", user).into_bytes()
    }

    pub(crate) fn stats_key(user: &str) -> Vec<u8> {
        format!("stats:{}", user).into_bytes()
    }

    pub(crate) fn unlocks_key(user: &str) -> Vec<u8> {
        format!("unlocks:{}", user).into_bytes()
    }

    pub(crate) fn wallet_key(user: &str) -> Vec<u8> {
        format!("wallet:{}", user).into_bytes()
    }

    pub(crate) fn counts_key(user: &str, deck: &str) -> Vec<u8> {
        format!("counts:{}:{}", key_segment(user), key_segment(deck)).into_bytes()
    }

    pub(crate) fn inventory_key(user: &str) -> Vec<u8> {
        format!("inventory:{}", user).into_bytes()
    }

    pub(crate) fn session_key(user: &str, deck: &str, mode: StudyMode) -> Vec<u8> {
        format!(
            "session:{}:{}:{}",
            key_segment(user),
            key_segment(deck),
            mode.as_str()
        )
        .into_bytes()
    }

    /// Attempt keys embed a zero-padded timestamp so prefix scans come back
    /// in answer order, plus the record id to disambiguate same-instant
    /// answers.
    pub(crate) fn attempt_key(record: &AttemptRecord, nanos: i64) -> Vec<u8> {
        format!(
            "attempts:{}:{}:{}:{:020}:{}",
            key_segment(&record.user),
            key_segment(&record.deck),
            key_segment(&record.card),
            nanos,
            record.id
        )
        .into_bytes()
    }

    pub(crate) fn card_attempts_prefix(user: &str, deck: &str, card: &str) -> Vec<u8> {
        format!(
            "attempts:{}:{}:{}:",
            key_segment(user),
            key_segment(deck),
            key_segment(card)
        )
        .into_bytes()
    }

    pub(crate) fn deck_attempts_prefix(user: &str, deck: &str) -> Vec<u8> {
        format!("attempts:{}:{}:", key_segment(user), key_segment(deck)).into_bytes()
    }

    // ------------------------------------------------------------------
    // Serialization helpers
    // ------------------------------------------------------------------

    pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
        Ok(bincode::serialize(value)?)
    }

    /// Decode a persisted record, rejecting documents written under a
    /// different schema version.
    pub(crate) fn decode<T>(bytes: &[u8]) -> Result<T, EngineError>
    where
        T: serde::de::DeserializeOwned + VersionedRecord,
    {
        let record: T = bincode::deserialize(bytes)?;
        if record.version() != T::VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: T::ENTITY,
                expected: T::VERSION,
                found: record.version(),
            });
        }
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Progress documents (absent documents default per the error design)
    // ------------------------------------------------------------------

    /// Fetch deck progress, defaulting to a fresh level-1 record when absent.
    pub fn deck_progress(
        &self,
        user: &str,
        deck: &str,
        xp: &XpConfig,
    ) -> Result<DeckProgress, EngineError> {
        match self.progress.get(Self::deck_key(user, deck))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(DeckProgress::new(deck, xp.deck_xp_base)),
        }
    }

    pub fn put_deck_progress(&self, user: &str, record: &DeckProgress) -> Result<(), EngineError> {
        let bytes = Self::encode(record)?;
        self.progress.insert(Self::deck_key(user, &record.deck), bytes)?;
        self.progress.flush()?;
        Ok(())
    }

    pub fn put_commander_progress(
        &self,
        user: &str,
        record: &CommanderProgress,
    ) -> Result<(), EngineError> {
        let bytes = Self::encode(record)?;
        self.progress.insert(Self::commander_key(user), bytes)?;
        self.progress.flush()?;
        Ok(())
    }

    /// Fetch commander progress, defaulting when absent.
    pub fn commander_progress(
        &self,
        user: &str,
        xp: &XpConfig,
    ) -> Result<CommanderProgress, EngineError> {
        match self.progress.get(Self::commander_key(user))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(CommanderProgress::new(xp.commander_xp_base)),
        }
    }

    /// Fetch the per-user XP window stats, defaulting when absent.
    pub fn xp_stats(&self, user: &str) -> Result<XpStats, EngineError> {
        match self.progress.get(Self::stats_key(user))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(XpStats::new(Utc::now())),
        }
    }

    pub fn put_xp_stats(&self, user: &str, stats: &XpStats) -> Result<(), EngineError> {
        let bytes = Self::encode(stats)?;
        self.progress.insert(Self::stats_key(user), bytes)?;
        self.progress.flush()?;
        Ok(())
    }

    pub fn unlocks(&self, user: &str) -> Result<UnlockedCustomizations, EngineError> {
        match self.progress.get(Self::unlocks_key(user))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(UnlockedCustomizations::new()),
        }
    }

    // ------------------------------------------------------------------
    // Economy documents
    // ------------------------------------------------------------------

    pub fn wallet(&self, user: &str) -> Result<TokenWallet, EngineError> {
        match self.economy.get(Self::wallet_key(user))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(TokenWallet::new()),
        }
    }

    pub fn purchase_counts(&self, user: &str, deck: &str) -> Result<PurchaseCounts, EngineError> {
        match self.economy.get(Self::counts_key(user, deck))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(PurchaseCounts::new(deck)),
        }
    }

    pub fn inventory(&self, user: &str) -> Result<Inventory, EngineError> {
        match self.economy.get(Self::inventory_key(user))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(Inventory::new()),
        }
    }

    // ------------------------------------------------------------------
    // Attempt history (read side; writes happen inside the attempt
    // transaction)
    // ------------------------------------------------------------------

    /// All prior attempts on one card, oldest first.
    pub fn attempts_for_card(
        &self,
        user: &str,
        deck: &str,
        card: &str,
    ) -> Result<Vec<AttemptRecord>, EngineError> {
        let prefix = Self::card_attempts_prefix(user, deck, card);
        self.scan_attempts(&prefix)
    }

    /// All attempts in a deck, oldest first per card.
    pub fn attempts_for_deck(
        &self,
        user: &str,
        deck: &str,
    ) -> Result<Vec<AttemptRecord>, EngineError> {
        let prefix = Self::deck_attempts_prefix(user, deck);
        self.scan_attempts(&prefix)
    }

    fn scan_attempts(&self, prefix: &[u8]) -> Result<Vec<AttemptRecord>, EngineError> {
        let mut records = Vec::new();
        for entry in self.attempts.scan_prefix(prefix) {
            let (_key, value) = entry?;
            records.push(Self::decode::<AttemptRecord>(&value)?);
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Fetch the persisted session for (user, deck, mode), if any. A document
    /// that fails to decode or carries the wrong schema version surfaces as
    /// `MalformedSession` so the caller can rebuild it; sessions are cursor
    /// state, never worth failing an operation over.
    pub fn session(
        &self,
        user: &str,
        deck: &str,
        mode: StudyMode,
    ) -> Result<Option<SessionRecord>, EngineError> {
        let Some(bytes) = self.sessions.get(Self::session_key(user, deck, mode))? else {
            return Ok(None);
        };
        match Self::decode::<SessionRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(_) => Err(EngineError::MalformedSession(format!(
                "undecodable session document for deck {}",
                deck
            ))),
        }
    }

    pub fn put_session(&self, user: &str, record: &SessionRecord) -> Result<(), EngineError> {
        let bytes = Self::encode(record)?;
        self.sessions
            .insert(Self::session_key(user, &record.deck, record.mode), bytes)?;
        self.sessions.flush()?;
        Ok(())
    }

    pub fn clear_session(
        &self,
        user: &str,
        deck: &str,
        mode: StudyMode,
    ) -> Result<(), EngineError> {
        debug!("clearing {} session for deck {}", mode, deck);
        self.sessions.remove(Self::session_key(user, deck, mode))?;
        self.sessions.flush()?;
        Ok(())
    }
}
