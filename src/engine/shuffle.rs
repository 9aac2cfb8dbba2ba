//! Deterministic, seedable card shuffling. A stable string hash feeds a
//! ChaCha8 stream driving a Fisher-Yates shuffle, so re-deriving the same
//! seed always yields the same permutation. Quest sessions rely on this to
//! resume after a crash without persisting the full shuffled list.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the input with a splitmix-style finisher so short, similar
/// seed strings still land far apart in seed space.
pub fn stable_hash(input: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    // Finisher from splitmix64.
    hash ^= hash >> 30;
    hash = hash.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    hash ^= hash >> 27;
    hash = hash.wrapping_mul(0x94d0_49bb_1331_11eb);
    hash ^ (hash >> 31)
}

/// Seed for a (user, deck, label) ordering. The label distinguishes quest
/// tiers from remix generations.
pub fn shuffle_seed(user: &str, deck: &str, label: &str) -> u64 {
    stable_hash(&format!("{}:{}:{}", user, deck, label))
}

/// Deterministic permutation of `ids` under `seed`.
pub fn shuffled_order(ids: &[String], seed: u64) -> Vec<String> {
    let mut order: Vec<String> = ids.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    order
}

/// Deterministic shuffled subset of at most `cap` ids.
pub fn shuffled_subset(ids: &[String], seed: u64, cap: usize) -> Vec<String> {
    let mut order = shuffled_order(ids, seed);
    order.truncate(cap);
    order
}
