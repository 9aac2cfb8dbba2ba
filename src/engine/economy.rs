//! Token economy: escalating power-up prices, durable shop inventory, and
//! the purchase-count reset that accompanies paying to skip a mastery gate.
//! Every purchase verifies and mutates the wallet inside one transaction so
//! a failed check never leaves partial state.

use chrono::Utc;
use log::{debug, info};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};

use crate::config::Config;
use crate::engine::errors::EngineError;
use crate::engine::store::ProgressStore;
use crate::engine::types::{Inventory, PowerUpKind, PurchaseCounts, TokenWallet};
use crate::logutil::escape_log;

/// Escalating price: 10% on top of base per prior purchase of the same kind
/// within the same deck, rounded up. Integer arithmetic so `ceil(20 * 1.3)`
/// is exactly 26 rather than a float artifact.
pub fn power_up_price(base_price: i64, prior_purchases: u32) -> i64 {
    let scaled = base_price * (10 + i64::from(prior_purchases));
    (scaled + 9) / 10
}

/// Result of a successful power-up purchase.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseReceipt {
    pub kind: PowerUpKind,
    pub price: i64,
    pub balance: i64,
    /// Purchases of this kind in this deck, including this one.
    pub purchase_count: u32,
}

fn abort(err: EngineError) -> ConflictableTransactionError<EngineError> {
    ConflictableTransactionError::Abort(err)
}

impl ProgressStore {
    /// Buy one power-up for use in `deck`. Fails with `InsufficientTokens`
    /// without mutating anything when the balance cannot cover the
    /// escalated price.
    pub fn purchase_power_up(
        &self,
        config: &Config,
        user: &str,
        deck: &str,
        kind: PowerUpKind,
    ) -> Result<PurchaseReceipt, EngineError> {
        let base_price = config.powerups.base_price(kind);
        let now = Utc::now();

        let receipt = self
            .economy
            .transaction(
                |economy| -> ConflictableTransactionResult<PurchaseReceipt, EngineError> {
                    let mut wallet = match economy.get(Self::wallet_key(user))? {
                        Some(bytes) => Self::decode::<TokenWallet>(&bytes).map_err(abort)?,
                        None => TokenWallet::new(),
                    };
                    let mut counts = match economy.get(Self::counts_key(user, deck))? {
                        Some(bytes) => Self::decode::<PurchaseCounts>(&bytes).map_err(abort)?,
                        None => PurchaseCounts::new(deck),
                    };

                    let price = power_up_price(base_price, counts.count(kind));
                    if wallet.balance < price {
                        return Err(abort(EngineError::InsufficientTokens {
                            needed: price,
                            balance: wallet.balance,
                        }));
                    }

                    wallet.balance -= price;
                    wallet.updated_at = now;
                    counts.bump(kind);

                    economy.insert(
                        Self::wallet_key(user),
                        Self::encode(&wallet).map_err(abort)?,
                    )?;
                    economy.insert(
                        Self::counts_key(user, deck),
                        Self::encode(&counts).map_err(abort)?,
                    )?;

                    Ok(PurchaseReceipt {
                        kind,
                        price,
                        balance: wallet.balance,
                        purchase_count: counts.count(kind),
                    })
                },
            )?;

        self.economy.flush()?;
        debug!(
            "power-up {} purchased by {} in deck {} for {} tokens",
            kind,
            escape_log(user),
            escape_log(deck),
            receipt.price
        );
        Ok(receipt)
    }

    /// Buy a shop item at a fixed cost. Inventory counters are durable and,
    /// unlike power-up purchase counts, never reset.
    pub fn purchase_shop_item(
        &self,
        user: &str,
        item_id: &str,
        cost: i64,
    ) -> Result<i64, EngineError> {
        let now = Utc::now();
        let balance = self
            .economy
            .transaction(|economy| -> ConflictableTransactionResult<i64, EngineError> {
                let mut wallet = match economy.get(Self::wallet_key(user))? {
                    Some(bytes) => Self::decode::<TokenWallet>(&bytes).map_err(abort)?,
                    None => TokenWallet::new(),
                };
                if wallet.balance < cost {
                    return Err(abort(EngineError::InsufficientTokens {
                        needed: cost,
                        balance: wallet.balance,
                    }));
                }
                let mut inventory = match economy.get(Self::inventory_key(user))? {
                    Some(bytes) => Self::decode::<Inventory>(&bytes).map_err(abort)?,
                    None => Inventory::new(),
                };

                wallet.balance -= cost;
                wallet.updated_at = now;
                inventory.add(item_id, 1);

                economy.insert(
                    Self::wallet_key(user),
                    Self::encode(&wallet).map_err(abort)?,
                )?;
                economy.insert(
                    Self::inventory_key(user),
                    Self::encode(&inventory).map_err(abort)?,
                )?;
                Ok(wallet.balance)
            })?;

        self.economy.flush()?;
        debug!(
            "shop item {} purchased by {} for {} tokens",
            escape_log(item_id),
            escape_log(user),
            cost
        );
        Ok(balance)
    }

    /// Clear all power-up purchase counts for a deck so prices return to
    /// base. Called when a player pays to bypass a mastery gate.
    pub fn reset_deck_purchase_counts(&self, user: &str, deck: &str) -> Result<(), EngineError> {
        self.economy.remove(Self::counts_key(user, deck))?;
        self.economy.flush()?;
        debug!(
            "purchase counts reset for {} deck {}",
            escape_log(user),
            escape_log(deck)
        );
        Ok(())
    }

    /// Pay tokens to bypass a mastery gate. Charges the configured cost and
    /// resets the deck's power-up purchase counts in the same transaction.
    pub fn purchase_tier_skip(
        &self,
        config: &Config,
        user: &str,
        deck: &str,
    ) -> Result<i64, EngineError> {
        let cost = config.tokens.tier_skip_cost;
        let now = Utc::now();
        let balance = self
            .economy
            .transaction(|economy| -> ConflictableTransactionResult<i64, EngineError> {
                let mut wallet = match economy.get(Self::wallet_key(user))? {
                    Some(bytes) => Self::decode::<TokenWallet>(&bytes).map_err(abort)?,
                    None => TokenWallet::new(),
                };
                if wallet.balance < cost {
                    return Err(abort(EngineError::InsufficientTokens {
                        needed: cost,
                        balance: wallet.balance,
                    }));
                }
                wallet.balance -= cost;
                wallet.updated_at = now;

                economy.insert(
                    Self::wallet_key(user),
                    Self::encode(&wallet).map_err(abort)?,
                )?;
                economy.remove(Self::counts_key(user, deck))?;
                Ok(wallet.balance)
            })?;

        self.economy.flush()?;
        info!(
            "{} paid {} tokens to skip a mastery gate in deck {}",
            escape_log(user),
            cost,
            escape_log(deck)
        );
        Ok(balance)
    }

    /// Credit tokens outside attempt processing (admin grants, refunds).
    pub fn grant_tokens(&self, user: &str, amount: i64) -> Result<i64, EngineError> {
        let now = Utc::now();
        let balance = self
            .economy
            .transaction(|economy| -> ConflictableTransactionResult<i64, EngineError> {
                let mut wallet = match economy.get(Self::wallet_key(user))? {
                    Some(bytes) => Self::decode::<TokenWallet>(&bytes).map_err(abort)?,
                    None => TokenWallet::new(),
                };
                wallet.balance += amount;
                wallet.updated_at = now;
                economy.insert(
                    Self::wallet_key(user),
                    Self::encode(&wallet).map_err(abort)?,
                )?;
                Ok(wallet.balance)
            })?;
        self.economy.flush()?;
        Ok(balance)
    }

    pub fn token_balance(&self, user: &str) -> Result<i64, EngineError> {
        Ok(self.wallet(user)?.balance)
    }
}
