//! # Causeway Core
//!
//! Shared logic for Causeway: data models, the fixed humanitarian
//! category set, vector utilities, score normalization, the store
//! abstraction, and the portfolio rebalancing planner.
//!
//! This crate contains no tokio, sqlx, network I/O, or other
//! application-level dependencies. Everything that talks to an external
//! service (embedding API, chat completions, contract bridge, SQLite)
//! lives in the `causeway` app crate and reaches this logic through the
//! [`store::Store`] trait and plain function calls.

pub mod categories;
pub mod embedding;
pub mod models;
pub mod rebalance;
pub mod score;
pub mod store;
