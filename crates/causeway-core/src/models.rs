//! Core data models used throughout Causeway.
//!
//! These types represent the charities, users, articles, and portfolio
//! holdings that flow through the matching and rebalancing pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A charity in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charity {
    pub id: String,
    pub name: String,
    pub mission: String,
    pub url: Option<String>,
    /// On-chain wallet address (`0x` + 40 hex chars).
    pub wallet: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A category assignment with its similarity score in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub category: String,
    pub similarity: f64,
}

/// A platform user subscribed to one or more categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub wallet: String,
    /// The free-text humanitarian concern the user signed up with.
    pub concern: String,
    /// Whether portfolio mutations should disburse funds immediately.
    pub instant_updates: bool,
    pub created_at: i64,
}

/// A user × category subscription row, as returned by
/// [`Store::subscribers_for_category`](crate::store::Store::subscribers_for_category).
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub user_id: String,
    pub wallet: String,
    pub category: String,
    /// The user's confidence score for this category, in `[0, 1]`.
    pub confidence: f64,
    pub instant_updates: bool,
}

/// A news article pulled from an RSS feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
    #[serde(default)]
    pub published_at: Option<i64>,
}

impl Article {
    /// Stable identifier derived from the link.
    ///
    /// The link is the dedup key: the same story re-fetched from a feed
    /// must map to the same id.
    pub fn dedup_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.link.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Title and description joined for embedding and prompting.
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.description)
        }
    }
}

/// Record of a processed article, written after the engine finishes with it.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub id: String,
    pub link: String,
    pub title: String,
    pub description: String,
    pub relevant: bool,
    pub urgency: Option<f64>,
    pub top_category: Option<String>,
    pub processed_at: i64,
}

/// One entry in a user's donation portfolio.
///
/// Portfolios are mirrored on-chain: the wallet/percentage pairs here are
/// exactly what `setCharities` receives. Percentages are integers and a
/// full portfolio sums to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub wallet: String,
    pub name: Option<String>,
    pub percentage: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_id_stable() {
        let a = Article {
            title: "Flood hits coastal towns".into(),
            description: "Thousands displaced".into(),
            link: "https://example.com/flood".into(),
            published_at: None,
        };
        let b = Article {
            title: "Different headline".into(),
            description: String::new(),
            link: "https://example.com/flood".into(),
            published_at: Some(1700000000),
        };
        assert_eq!(a.dedup_id(), b.dedup_id());
    }

    #[test]
    fn test_dedup_id_differs_by_link() {
        let a = Article {
            title: "t".into(),
            description: String::new(),
            link: "https://example.com/a".into(),
            published_at: None,
        };
        let b = Article {
            link: "https://example.com/b".into(),
            ..a.clone()
        };
        assert_ne!(a.dedup_id(), b.dedup_id());
    }

    #[test]
    fn test_article_text_joins_title_and_description() {
        let a = Article {
            title: "Quake".into(),
            description: "Aid needed".into(),
            link: "l".into(),
            published_at: None,
        };
        assert_eq!(a.text(), "Quake Aid needed");

        let bare = Article {
            description: String::new(),
            ..a
        };
        assert_eq!(bare.text(), "Quake");
    }
}
