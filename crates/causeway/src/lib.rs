//! # Causeway
//!
//! **News-driven charity donation allocation.**
//!
//! Causeway watches humanitarian news, matches articles to a fixed set
//! of humanitarian categories via embedding similarity, scores how
//! urgent each situation is, and rebalances subscribed users' on-chain
//! donation splits toward the charities best placed to respond.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ RSS feeds │──▶│   Pipeline    │──▶│  SQLite   │
//! │           │   │ match+score  │   │ vectors  │
//! └───────────┘   └──────┬───────┘   └────┬─────┘
//!                        │                │
//!                        ▼                ▼
//!                 ┌────────────┐    ┌──────────┐
//!                 │  Contract  │    │ CLI/HTTP │
//!                 │   bridge   │    │  (cwy)   │
//!                 └────────────┘    └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **feed poller** ([`feeds`]) fetches RSS items and normalizes
//!    them into articles.
//! 2. The **engine** ([`engine`]) gates each article on humanitarian
//!    relevance, embeds it ([`embedding`]), and matches it against the
//!    category vectors with min-max normalized confidence.
//! 3. An **urgency score** ([`llm`]) on a 1-10 scale drives how far
//!    each subscriber's portfolio shifts.
//! 4. The **rebalance planner** (in `causeway-core`) produces an
//!    integer allocation summing to exactly 100.
//! 5. Changed allocations go on-chain through the **contract bridge**
//!    ([`chain`]) and are mirrored locally ([`sqlite_store`]).
//! 6. Everything is driven by the **CLI** (`cwy`) or the **HTTP
//!    server** ([`server`]).
//!
//! ## Quick Start
//!
//! ```bash
//! cwy init                           # create database
//! cwy load charities.json            # ingest and categorize charities
//! cwy subscribe "clean water access" --wallet 0x...
//! cwy match "Earthquake hits region" # dry-run one article
//! cwy watch                          # poll feeds and rebalance
//! cwy serve                          # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool setup |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`embedding`] | Embedding providers (OpenAI, disabled) |
//! | [`llm`] | Relevance gate and urgency scoring |
//! | [`feeds`] | RSS fetching and parsing |
//! | [`chain`] | Contract bridge: on-chain splits and disbursement |
//! | [`fault`] | Typed error classification for HTTP status mapping |
//! | [`engine`] | The article processing pipeline |
//! | [`load`] | Charity catalog ingestion |
//! | [`subscribe`] | User registration by concern |
//! | [`match_cmd`] | Single-article dry runs |
//! | [`portfolio`] | Portfolio display |
//! | [`server`] | JSON HTTP API |

pub mod chain;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod fault;
pub mod feeds;
pub mod llm;
pub mod load;
pub mod match_cmd;
pub mod migrate;
pub mod portfolio;
pub mod server;
pub mod sqlite_store;
pub mod subscribe;
