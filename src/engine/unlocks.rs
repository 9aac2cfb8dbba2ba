//! Threshold table mapping commander levels to cosmetic unlocks. Consulted
//! by attempt processing whenever a commander level-up lands.

/// A cosmetic item unlocked at a commander level threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosmeticItem {
    pub id: &'static str,
    pub name: &'static str,
    pub level: u32,
}

/// Shipping avatar frames, ordered by threshold.
pub const UNLOCK_TABLE: &[CosmeticItem] = &[
    CosmeticItem {
        id: "frame_recruit",
        name: "Recruit Frame",
        level: 2,
    },
    CosmeticItem {
        id: "frame_bronze",
        name: "Bronze Frame",
        level: 5,
    },
    CosmeticItem {
        id: "frame_silver",
        name: "Silver Frame",
        level: 10,
    },
    CosmeticItem {
        id: "frame_gold",
        name: "Gold Frame",
        level: 15,
    },
    CosmeticItem {
        id: "frame_platinum",
        name: "Platinum Frame",
        level: 20,
    },
    CosmeticItem {
        id: "frame_mythic",
        name: "Mythic Frame",
        level: 30,
    },
];

/// The cosmetic whose threshold equals `level` exactly, if any.
pub fn unlock_for_level(level: u32) -> Option<&'static CosmeticItem> {
    UNLOCK_TABLE.iter().find(|item| item.level == level)
}

/// Every registered unlock, ordered by threshold.
pub fn all_unlocks() -> &'static [CosmeticItem] {
    UNLOCK_TABLE
}
