//! In-memory [`Store`] implementation for testing.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread
//! safety. Vector search is brute-force cosine similarity over all
//! stored vectors, matching the SQLite backend's behavior.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ArticleRecord, CategoryMatch, Charity, Holding, Subscriber, User};

use super::{CategoryCandidate, CharityHit, Store};

struct StoredCharity {
    charity: Charity,
    categories: Vec<CategoryMatch>,
    vector: Option<Vec<f32>>,
}

struct StoredUser {
    user: User,
    categories: Vec<CategoryMatch>,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    charities: RwLock<HashMap<String, StoredCharity>>,
    category_vectors: RwLock<HashMap<String, Vec<f32>>>,
    users: RwLock<HashMap<String, StoredUser>>,
    portfolios: RwLock<HashMap<String, Vec<Holding>>>,
    articles: RwLock<HashMap<String, ArticleRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            charities: RwLock::new(HashMap::new()),
            category_vectors: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            portfolios: RwLock::new(HashMap::new()),
            articles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_charity(&self, charity: &Charity) -> Result<String> {
        let mut charities = self.charities.write().unwrap();
        let existing_id = charities
            .values()
            .find(|s| s.charity.name == charity.name)
            .map(|s| s.charity.id.clone());
        let id = existing_id.unwrap_or_else(|| charity.id.clone());

        let entry = charities.entry(id.clone()).or_insert_with(|| StoredCharity {
            charity: charity.clone(),
            categories: Vec::new(),
            vector: None,
        });
        entry.charity = Charity {
            id: id.clone(),
            ..charity.clone()
        };
        Ok(id)
    }

    async fn set_charity_categories(
        &self,
        charity_id: &str,
        matches: &[CategoryMatch],
    ) -> Result<()> {
        let mut charities = self.charities.write().unwrap();
        if let Some(entry) = charities.get_mut(charity_id) {
            entry.categories = matches.to_vec();
        }
        Ok(())
    }

    async fn upsert_charity_vector(
        &self,
        charity_id: &str,
        vector: &[f32],
        _model: &str,
        _dims: usize,
    ) -> Result<()> {
        let mut charities = self.charities.write().unwrap();
        if let Some(entry) = charities.get_mut(charity_id) {
            entry.vector = Some(vector.to_vec());
        }
        Ok(())
    }

    async fn upsert_category_vector(
        &self,
        category: &str,
        vector: &[f32],
        _model: &str,
        _dims: usize,
    ) -> Result<()> {
        self.category_vectors
            .write()
            .unwrap()
            .insert(category.to_string(), vector.to_vec());
        Ok(())
    }

    async fn category_vector_count(&self) -> Result<usize> {
        Ok(self.category_vectors.read().unwrap().len())
    }

    async fn category_search(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<CategoryCandidate>> {
        let vectors = self.category_vectors.read().unwrap();
        let mut candidates: Vec<CategoryCandidate> = vectors
            .iter()
            .map(|(category, vec)| CategoryCandidate {
                category: category.clone(),
                raw_score: cosine_similarity(query_vec, vec) as f64,
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn charity_search(
        &self,
        query_vec: &[f32],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CharityHit>> {
        let charities = self.charities.read().unwrap();
        let mut hits: Vec<CharityHit> = charities
            .values()
            .filter(|s| match category {
                Some(cat) => s.categories.iter().any(|m| m.category == cat),
                None => true,
            })
            .filter_map(|s| {
                s.vector.as_ref().map(|vec| CharityHit {
                    id: s.charity.id.clone(),
                    name: s.charity.name.clone(),
                    mission: s.charity.mission.clone(),
                    wallet: s.charity.wallet.clone(),
                    raw_score: cosine_similarity(query_vec, vec) as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert_user(&self, user: &User, matches: &[CategoryMatch]) -> Result<()> {
        self.users.write().unwrap().insert(
            user.id.clone(),
            StoredUser {
                user: user.clone(),
                categories: matches.to_vec(),
            },
        );
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .get(user_id)
            .map(|s| s.user.clone()))
    }

    async fn subscribers_for_category(&self, category: &str) -> Result<Vec<Subscriber>> {
        let users = self.users.read().unwrap();
        let mut subscribers: Vec<Subscriber> = users
            .values()
            .filter_map(|s| {
                s.categories
                    .iter()
                    .find(|m| m.category == category)
                    .map(|m| Subscriber {
                        user_id: s.user.id.clone(),
                        wallet: s.user.wallet.clone(),
                        category: category.to_string(),
                        confidence: m.similarity,
                        instant_updates: s.user.instant_updates,
                    })
            })
            .collect();
        subscribers.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(subscribers)
    }

    async fn portfolio(&self, user_id: &str) -> Result<Vec<Holding>> {
        Ok(self
            .portfolios
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_portfolio(&self, user_id: &str, holdings: &[Holding]) -> Result<()> {
        self.portfolios
            .write()
            .unwrap()
            .insert(user_id.to_string(), holdings.to_vec());
        Ok(())
    }

    async fn article_seen(&self, link: &str) -> Result<bool> {
        Ok(self
            .articles
            .read()
            .unwrap()
            .values()
            .any(|r| r.link == link))
    }

    async fn record_article(&self, record: &ArticleRecord) -> Result<()> {
        self.articles
            .write()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn charity_names_by_wallets(&self, wallets: &[String]) -> Result<Vec<Option<String>>> {
        let charities = self.charities.read().unwrap();
        Ok(wallets
            .iter()
            .map(|w| {
                charities
                    .values()
                    .find(|s| &s.charity.wallet == w)
                    .map(|s| s.charity.name.clone())
            })
            .collect())
    }
}
