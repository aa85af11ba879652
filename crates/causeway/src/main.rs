//! # Causeway CLI (`cwy`)
//!
//! The `cwy` binary is the primary interface for Causeway. It provides
//! commands for database initialization, charity catalog ingestion,
//! user subscription, article dry runs, feed watching, portfolio
//! inspection, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! cwy --config ./config/causeway.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cwy init` | Create the SQLite database and run schema migrations |
//! | `cwy load <path>` | Ingest and categorize a charity catalog |
//! | `cwy subscribe "<concern>"` | Register a user by stated concern |
//! | `cwy match "<title>"` | Dry-run the pipeline on one article |
//! | `cwy watch` | Poll feeds and rebalance portfolios |
//! | `cwy portfolio <user-id>` | Show a user's donation split |
//! | `cwy serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! cwy init --config ./config/causeway.toml
//!
//! # Load a charity catalog
//! cwy load charities.json
//!
//! # Subscribe with instant fund disbursement on every rebalance
//! cwy subscribe "disaster response in coastal regions" \
//!     --wallet 0x01786AA502BEeF1862691399C5A526E4Ce16F43d --instant
//!
//! # Dry-run an article without touching any portfolio
//! cwy match "Earthquake strikes northern region" \
//!     --description "Thousands displaced as buildings collapse"
//!
//! # Single feed pass, then exit
//! cwy watch --once
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use causeway::{
    chain, config, db, engine, load, match_cmd, migrate, portfolio, server, sqlite_store,
    subscribe,
};
use causeway_core::store::Store;

/// Causeway CLI — news-driven charity donation allocation.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/causeway.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "cwy",
    about = "Causeway — news-driven charity donation allocation",
    version,
    long_about = "Causeway matches humanitarian news against charity missions and user \
    concerns via embedding similarity, scores urgency, and rebalances subscribed users' \
    on-chain donation splits toward the charities best placed to respond."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/causeway.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a charity catalog (JSON).
    ///
    /// Upserts each charity and, when an embedding provider is
    /// configured, seeds the category vectors and assigns each charity
    /// its top categories by mission similarity.
    Load {
        /// Path to the charity catalog JSON file.
        path: PathBuf,
    },

    /// Register a user by their stated concern.
    ///
    /// Embeds the concern, matches it to the top humanitarian
    /// categories, and stores the user. With a contract bridge
    /// configured the user is also enrolled on-chain.
    Subscribe {
        /// Free-text description of what the user cares about.
        concern: String,

        /// The user's wallet address (0x-prefixed, 40 hex chars).
        #[arg(long)]
        wallet: String,

        /// Disburse funds immediately after every rebalance.
        #[arg(long)]
        instant: bool,
    },

    /// Dry-run the pipeline on a single article.
    ///
    /// Prints the relevance verdict, matched categories, candidate
    /// charities, and urgency without rebalancing or recording
    /// anything.
    Match {
        /// Article title.
        title: String,

        /// Article description or summary.
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Poll the configured feeds and process new articles.
    ///
    /// Each pass fetches every feed, skips already processed
    /// articles, and rebalances subscriber portfolios for relevant
    /// ones.
    Watch {
        /// Run a single pass and exit instead of polling forever.
        #[arg(long)]
        once: bool,

        /// Seconds between passes, overriding `feeds.poll_secs`.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show a user's donation split.
    ///
    /// Reads the on-chain allocation when a bridge is configured,
    /// otherwise the local mirror.
    Portfolio {
        /// User ID (as printed by `subscribe`).
        user_id: String,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// the JSON API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let pool = db::connect(&cfg).await?;
    let store: Arc<dyn Store> = Arc::new(sqlite_store::SqliteStore::new(pool));
    let bridge = chain::create_bridge(&cfg.bridge)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Load { path } => {
            load::run_load(&cfg, store, &path).await?;
        }
        Commands::Subscribe {
            concern,
            wallet,
            instant,
        } => {
            subscribe::run_subscribe(&cfg, store, bridge, &concern, &wallet, instant).await?;
        }
        Commands::Match { title, description } => {
            let engine = engine::Engine::new(cfg.clone(), store, bridge);
            match_cmd::run_match(&engine, &title, &description).await?;
        }
        Commands::Watch { once, interval } => {
            let engine = engine::Engine::new(cfg.clone(), store, bridge);
            engine::run_watch(&engine, &cfg, once, interval).await?;
        }
        Commands::Portfolio { user_id } => {
            portfolio::run_portfolio(store, bridge, &user_id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg, store, bridge).await?;
        }
    }

    Ok(())
}
