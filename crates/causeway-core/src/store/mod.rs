//! Storage abstraction for Causeway.
//!
//! The [`Store`] trait defines all storage operations the matching and
//! rebalancing pipeline needs, enabling pluggable backends (SQLite in
//! the app crate, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ArticleRecord, CategoryMatch, Charity, Holding, Subscriber, User};

/// A category candidate returned from vector search, with its raw
/// (un-normalized) cosine similarity.
#[derive(Debug, Clone)]
pub struct CategoryCandidate {
    pub category: String,
    pub raw_score: f64,
}

/// A charity candidate returned from vector search.
///
/// Carries enough information to score, display, and commit the charity
/// without additional store round-trips.
#[derive(Debug, Clone)]
pub struct CharityHit {
    pub id: String,
    pub name: String,
    pub mission: String,
    pub wallet: String,
    pub raw_score: f64,
}

/// Abstract storage backend for Causeway.
///
/// All operations are async (via `async-trait`). The in-memory
/// implementation returns immediately-ready futures.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or update a charity by name. Returns the charity ID
    /// (existing or the one carried on `charity`).
    async fn upsert_charity(&self, charity: &Charity) -> Result<String>;

    /// Replace a charity's category memberships.
    async fn set_charity_categories(
        &self,
        charity_id: &str,
        matches: &[CategoryMatch],
    ) -> Result<()>;

    /// Store or update a charity's mission embedding.
    async fn upsert_charity_vector(
        &self,
        charity_id: &str,
        vector: &[f32],
        model: &str,
        dims: usize,
    ) -> Result<()>;

    /// Store or update a category label embedding.
    async fn upsert_category_vector(
        &self,
        category: &str,
        vector: &[f32],
        model: &str,
        dims: usize,
    ) -> Result<()>;

    /// Number of category embeddings currently stored.
    async fn category_vector_count(&self) -> Result<usize>;

    /// Nearest categories to a query embedding, best first.
    async fn category_search(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<CategoryCandidate>>;

    /// Nearest charities to a query embedding, best first, optionally
    /// restricted to members of one category.
    async fn charity_search(
        &self,
        query_vec: &[f32],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CharityHit>>;

    /// Insert or update a user together with their category preferences.
    async fn upsert_user(&self, user: &User, matches: &[CategoryMatch]) -> Result<()>;

    /// Retrieve a user by ID.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// All users subscribed to a category, with their confidence scores.
    async fn subscribers_for_category(&self, category: &str) -> Result<Vec<Subscriber>>;

    /// The locally mirrored portfolio for a user (empty if none).
    async fn portfolio(&self, user_id: &str) -> Result<Vec<Holding>>;

    /// Replace the locally mirrored portfolio for a user.
    async fn replace_portfolio(&self, user_id: &str, holdings: &[Holding]) -> Result<()>;

    /// True if an article link has already been processed.
    async fn article_seen(&self, link: &str) -> Result<bool>;

    /// Record a processed article.
    async fn record_article(&self, record: &ArticleRecord) -> Result<()>;

    /// Charity names for a list of wallets, in input order. Unknown
    /// wallets yield `None`.
    async fn charity_names_by_wallets(&self, wallets: &[String]) -> Result<Vec<Option<String>>>;
}
