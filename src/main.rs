//! Binary entrypoint for the deckforge CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and open the local store
//! - `answer` - log one answered card and print the reward breakdown
//! - `stats` - print progress, wallet, and unlock state for a user
//! - `shop` - token balance, power-up and item purchases, tier skip
//! - `session` - start, inspect, or advance a quest/remix session
//!
//! The CLI ships a small built-in demo deck ("geography") so the engine can
//! be exercised without a real card catalog behind it.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use deckforge::config::Config;
use deckforge::engine::types::{BloomTier, PowerUpKind, StudyMode};
use deckforge::engine::{MemoryCatalog, ProgressStore};

#[derive(Parser)]
#[command(name = "deckforge")]
#[command(about = "Progression and economy engine for a flashcard study app")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter configuration and initialize the store
    Init,
    /// Log one answered card
    Answer {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "geography")]
        deck: String,
        #[arg(long)]
        card: String,
        /// Bloom tier: remember, understand, apply, analyze, evaluate, create
        #[arg(short, long)]
        tier: String,
        /// Whether the answer was correct
        #[arg(long)]
        correct: bool,
    },
    /// Show progress and economy state for a user
    Stats {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "geography")]
        deck: String,
    },
    /// Token economy operations
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Study session operations
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum ShopAction {
    /// Print the token balance
    Balance {
        #[arg(short, long)]
        user: String,
    },
    /// Buy a power-up (price escalates per purchase)
    BuyPowerup {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "geography")]
        deck: String,
        /// Power-up kind: fifty_fifty, retry, hint, time_freeze
        #[arg(short, long)]
        kind: String,
    },
    /// Buy a shop item at a fixed cost
    BuyItem {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        item: String,
        #[arg(long)]
        cost: i64,
    },
    /// Pay tokens to skip a mastery gate (resets power-up prices)
    SkipTier {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "geography")]
        deck: String,
    },
    /// Grant tokens directly (local testing)
    Grant {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        amount: i64,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start or resume a session and print the current card
    Start {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "geography")]
        deck: String,
        /// Study mode: quest or remix
        #[arg(short, long, default_value = "quest")]
        mode: String,
        /// Discard any persisted session and start fresh
        #[arg(long)]
        restart: bool,
    },
    /// Advance past the current card and print the next one
    Next {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "geography")]
        deck: String,
        #[arg(short, long, default_value = "quest")]
        mode: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: &str) -> Config {
    match Config::load(path) {
        Ok(config) => config,
        Err(_) => Config::default(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config)?;
            let config = Config::load(&cli.config)?;
            ProgressStore::open(&config.storage.data_dir)?;
            info!("wrote {} and initialized {}", cli.config, config.storage.data_dir);
            println!("Initialized deckforge (config: {})", cli.config);
            Ok(())
        }
        Commands::Answer {
            user,
            deck,
            card,
            tier,
            correct,
        } => {
            let config = load_config(&cli.config);
            let store = ProgressStore::open(&config.storage.data_dir)?;
            let catalog = MemoryCatalog::demo();
            let tier: BloomTier = tier.parse().map_err(|e: String| anyhow!(e))?;
            let outcome = store.log_attempt(&catalog, &config, &user, &deck, &card, tier, correct)?;
            if outcome.was_correct {
                println!(
                    "+{} XP (base {}, weak +{}, recency {}, streak +{}), streak {}, +{} tokens",
                    outcome.awarded_xp,
                    outcome.breakdown.base,
                    outcome.breakdown.weak_card_bonus,
                    outcome.breakdown.recency_penalty,
                    outcome.streak_bonus,
                    outcome.streak,
                    outcome.awarded_tokens
                );
                if outcome.deck_level_up {
                    println!("Deck level up! Now level {}", outcome.deck_level);
                }
                if outcome.commander_level_up {
                    println!("Commander level up! Now level {}", outcome.commander_level);
                }
                for item in &outcome.unlocked {
                    println!("Unlocked: {}", item.name);
                }
                if outcome.deck_mastered {
                    println!("Deck mastered!");
                }
            } else {
                println!("Incorrect. Streak reset.");
            }
            Ok(())
        }
        Commands::Stats { user, deck } => {
            let config = load_config(&cli.config);
            let store = ProgressStore::open(&config.storage.data_dir)?;
            let progress = store.deck_progress(&user, &deck, &config.xp)?;
            let commander = store.commander_progress(&user, &config.xp)?;
            let stats = store.xp_stats(&user)?;
            let wallet = store.wallet(&user)?;
            let unlocks = store.unlocks(&user)?;
            let summary = serde_json::json!({
                "deck": {
                    "name": progress.deck,
                    "level": progress.level,
                    "xp": progress.xp,
                    "xp_to_next": progress.xp_to_next,
                    "streak": progress.streak,
                    "mastered": progress.mastered,
                },
                "commander": {
                    "level": commander.level,
                    "xp": commander.xp,
                    "xp_to_next": commander.xp_to_next,
                },
                "windows": {
                    "session_xp": stats.session_xp,
                    "daily_xp": stats.daily_xp,
                    "bonus_vault": stats.bonus_vault,
                    "xp_boosted": stats.xp_boosted,
                },
                "tokens": wallet.balance,
                "unlocked": unlocks.unlocked,
                "active_cosmetic": unlocks.active,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Shop { action } => {
            let config = load_config(&cli.config);
            let store = ProgressStore::open(&config.storage.data_dir)?;
            match action {
                ShopAction::Balance { user } => {
                    println!("{} tokens", store.token_balance(&user)?);
                }
                ShopAction::BuyPowerup { user, deck, kind } => {
                    let kind: PowerUpKind = kind.parse().map_err(|e: String| anyhow!(e))?;
                    let receipt = store.purchase_power_up(&config, &user, &deck, kind)?;
                    println!(
                        "Bought {} for {} tokens ({} remaining, purchase #{})",
                        receipt.kind, receipt.price, receipt.balance, receipt.purchase_count
                    );
                }
                ShopAction::BuyItem { user, item, cost } => {
                    let balance = store.purchase_shop_item(&user, &item, cost)?;
                    println!("Bought {} for {} tokens ({} remaining)", item, cost, balance);
                }
                ShopAction::SkipTier { user, deck } => {
                    let balance = store.purchase_tier_skip(&config, &user, &deck)?;
                    println!(
                        "Mastery gate skipped for {} tokens ({} remaining); power-up prices reset",
                        config.tokens.tier_skip_cost, balance
                    );
                }
                ShopAction::Grant { user, amount } => {
                    let balance = store.grant_tokens(&user, amount)?;
                    println!("Granted {} tokens ({} total)", amount, balance);
                }
            }
            Ok(())
        }
        Commands::Session { action } => {
            let config = load_config(&cli.config);
            let store = ProgressStore::open(&config.storage.data_dir)?;
            let catalog = MemoryCatalog::demo();
            let view = match action {
                SessionAction::Start {
                    user,
                    deck,
                    mode,
                    restart,
                } => {
                    let mode: StudyMode = mode.parse().map_err(|e: String| anyhow!(e))?;
                    store.get_or_create_session(&catalog, &config, &user, &deck, mode, restart)?
                }
                SessionAction::Next { user, deck, mode } => {
                    let mode: StudyMode = mode.parse().map_err(|e: String| anyhow!(e))?;
                    store.advance_session(&catalog, &config, &user, &deck, mode)?
                }
            };
            match view.current_card() {
                Some(card) => {
                    let tier = view
                        .record
                        .tier
                        .map(|t| format!(" [{}]", t))
                        .unwrap_or_default();
                    println!(
                        "Card {}/{}{}: {}",
                        view.record.cursor + 1,
                        view.order.len(),
                        tier,
                        card
                    );
                }
                None => println!("Session complete."),
            }
            Ok(())
        }
    }
}
