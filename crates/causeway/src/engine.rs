//! Article processing pipeline.
//!
//! One [`Engine`] instance owns the store, the optional contract
//! bridge, and the tuning knobs from config. For each article it runs
//! the full chain: dedup, relevance gate, category matching,
//! subscriber fan-out, charity search, urgency scoring, and per-user
//! rebalancing. Per-subscriber failures are logged and skipped so a
//! single bad wallet cannot stall the batch.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

use causeway_core::models::{Article, ArticleRecord, Holding, Subscriber};
use causeway_core::rebalance::{plan_rebalance, CharityCandidate, RebalancePlan};
use causeway_core::score::{normalize_similarities, relevance_score};
use causeway_core::store::{CategoryCandidate, Store};

use crate::chain::ContractBridge;
use crate::config::Config;
use crate::embedding::{create_provider, embed_query};
use crate::llm;

/// Everything the pipeline learned about one article. Returned by
/// [`Engine::analyze`] so the `match` command can print a dry run
/// without committing anything.
pub struct Analysis {
    pub relevant: bool,
    /// The relevance gate's one-line reason, possibly empty.
    pub reason: String,
    /// Top categories with min-max normalized confidence, best first.
    pub categories: Vec<(String, f64)>,
    /// Candidate charities for the top category, blended relevance.
    pub charities: Vec<CharityCandidate>,
    pub urgency: f64,
}

/// Outcome of processing one article end to end.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub skipped_duplicate: bool,
    pub relevant: bool,
    pub subscribers: usize,
    pub rebalanced: usize,
    pub disbursed: usize,
}

pub struct Engine {
    config: Config,
    store: Arc<dyn Store>,
    bridge: Option<Arc<dyn ContractBridge>>,
}

impl Engine {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        bridge: Option<Arc<dyn ContractBridge>>,
    ) -> Self {
        Self {
            config,
            store,
            bridge,
        }
    }

    /// Run the analysis half of the pipeline without committing
    /// anything: relevance gate, category match, charity candidates,
    /// urgency. Confidence from the caller's perspective is 1.0 here;
    /// per-subscriber confidence is blended in during processing.
    pub async fn analyze(&self, article: &Article) -> Result<Analysis> {
        let verdict = self.relevance_gate(article).await;
        if !verdict.relevant {
            return Ok(Analysis {
                relevant: false,
                reason: verdict.reason,
                categories: Vec::new(),
                charities: Vec::new(),
                urgency: 0.0,
            });
        }
        let reason = verdict.reason;

        let provider = create_provider(&self.config.embedding)?;
        let query = embed_query(provider.as_ref(), &self.config.embedding, &article.text()).await?;
        let categories = self.match_categories(&query).await?;
        let top_category = categories.first().map(|(c, _)| c.clone());

        let urgency = self.urgency(article).await;
        let charities = self
            .charity_candidates(&query, top_category.as_deref(), urgency, 1.0)
            .await?;

        Ok(Analysis {
            relevant: true,
            reason,
            categories,
            charities,
            urgency,
        })
    }

    /// Process one article end to end: analyze, fan out to subscribers
    /// of the top category, rebalance each portfolio, and record the
    /// article so it is never processed twice.
    pub async fn process_article(&self, article: &Article) -> Result<ProcessOutcome> {
        let mut outcome = ProcessOutcome::default();

        if self.store.article_seen(&article.link).await? {
            println!("Skipping already processed article: {}", article.title);
            outcome.skipped_duplicate = true;
            return Ok(outcome);
        }

        println!("\nProcessing article: {}", article.title);

        let verdict = self.relevance_gate(article).await;
        if !verdict.relevant {
            if verdict.reason.is_empty() {
                println!("  Not relevant to humanitarian concerns");
            } else {
                println!("  Not relevant: {}", verdict.reason);
            }
            self.record(article, false, None, None).await?;
            return Ok(outcome);
        }
        outcome.relevant = true;

        let provider = create_provider(&self.config.embedding)?;
        let query = embed_query(provider.as_ref(), &self.config.embedding, &article.text()).await?;
        let categories = self.match_categories(&query).await?;
        let Some((top_category, _)) = categories.first().cloned() else {
            println!("  No category vectors loaded; run `cwy load` first");
            self.record(article, true, None, None).await?;
            return Ok(outcome);
        };
        println!("  Top category: {}", top_category);

        let urgency = self.urgency(article).await;
        println!("  Urgency: {:.1}/10", urgency);

        let subscribers = self.store.subscribers_for_category(&top_category).await?;
        outcome.subscribers = subscribers.len();
        if subscribers.is_empty() {
            println!("  No subscribers for {}", top_category);
            self.record(article, true, Some(urgency), Some(&top_category))
                .await?;
            return Ok(outcome);
        }
        println!("  {} subscriber(s) to notify", subscribers.len());

        for sub in &subscribers {
            match self
                .rebalance_subscriber(sub, &query, &top_category, urgency)
                .await
            {
                Ok(plan) => {
                    if plan.changed {
                        outcome.rebalanced += 1;
                    }
                    if plan.disburse {
                        outcome.disbursed += 1;
                    }
                }
                Err(e) => {
                    println!("  Failed to rebalance user {}: {:#}", sub.user_id, e);
                }
            }
        }

        self.record(article, true, Some(urgency), Some(&top_category))
            .await?;
        Ok(outcome)
    }

    /// Rebalance one subscriber's portfolio for one article.
    async fn rebalance_subscriber(
        &self,
        sub: &Subscriber,
        query: &[f32],
        category: &str,
        urgency: f64,
    ) -> Result<RebalancePlan> {
        let candidates = self
            .charity_candidates(query, Some(category), urgency, sub.confidence)
            .await?;

        let current = self.current_portfolio(sub).await?;
        let Some(current) = current else {
            println!("  User {} not enrolled on-chain, skipping", sub.user_id);
            return Ok(RebalancePlan {
                holdings: Vec::new(),
                added: Vec::new(),
                removed: Vec::new(),
                changed: false,
                disburse: false,
            });
        };

        let params = self.config.engine.rebalance_params();
        let plan = plan_rebalance(&current, &candidates, urgency, &params);

        if plan.changed {
            println!(
                "  User {}: +[{}] -[{}]",
                sub.user_id,
                plan.added.join(", "),
                plan.removed.join(", ")
            );
            self.commit_plan(sub, &plan).await?;
        } else {
            println!("  User {}: portfolio unchanged", sub.user_id);
        }

        if plan.disburse || (sub.instant_updates && plan.changed) {
            if let Some(bridge) = &self.bridge {
                bridge
                    .split_among_charities(&sub.wallet)
                    .await
                    .context("Fund disbursement failed")?;
                println!("  User {}: funds disbursed", sub.user_id);
            }
        }

        Ok(plan)
    }

    /// Push a changed allocation on-chain (when a bridge is configured)
    /// and mirror it locally.
    async fn commit_plan(&self, sub: &Subscriber, plan: &RebalancePlan) -> Result<()> {
        let addresses: Vec<String> = plan.holdings.iter().map(|h| h.wallet.clone()).collect();
        let percentages: Vec<u32> = plan.holdings.iter().map(|h| h.percentage).collect();

        if let Some(bridge) = &self.bridge {
            bridge
                .set_charities(&sub.wallet, &addresses, &percentages)
                .await
                .context("Failed to update on-chain allocation")?;
        }
        self.store
            .replace_portfolio(&sub.user_id, &plan.holdings)
            .await?;
        Ok(())
    }

    /// The subscriber's current portfolio. On-chain state wins when a
    /// bridge is configured; `None` means the user is not enrolled and
    /// must be skipped rather than given a fresh allocation.
    async fn current_portfolio(&self, sub: &Subscriber) -> Result<Option<Vec<Holding>>> {
        if let Some(bridge) = &self.bridge {
            let Some(chain_user) = bridge.get_user(&sub.wallet).await? else {
                return Ok(None);
            };
            let names = self
                .store
                .charity_names_by_wallets(&chain_user.addresses)
                .await?;
            let holdings = chain_user
                .addresses
                .iter()
                .zip(chain_user.percentages.iter())
                .zip(names)
                .map(|((wallet, pct), name)| Holding {
                    wallet: wallet.clone(),
                    name,
                    percentage: *pct,
                })
                .collect();
            return Ok(Some(holdings));
        }
        Ok(Some(self.store.portfolio(&sub.user_id).await?))
    }

    /// Top-k categories with min-max normalized confidences.
    pub async fn match_categories(&self, query: &[f32]) -> Result<Vec<(String, f64)>> {
        let hits: Vec<CategoryCandidate> = self
            .store
            .category_search(query, self.config.engine.category_top_k)
            .await?;
        let raw: Vec<f64> = hits.iter().map(|h| h.raw_score).collect();
        let normalized = normalize_similarities(&raw);
        Ok(hits
            .into_iter()
            .zip(normalized)
            .map(|(h, score)| (h.category, score))
            .collect())
    }

    /// Charity candidates for a query, scored with the blended
    /// relevance formula.
    async fn charity_candidates(
        &self,
        query: &[f32],
        category: Option<&str>,
        urgency: f64,
        confidence: f64,
    ) -> Result<Vec<CharityCandidate>> {
        let weights = self.config.engine.relevance_weights();
        let hits = self
            .store
            .charity_search(query, category, self.config.engine.charity_top_k)
            .await?;
        Ok(hits
            .into_iter()
            .map(|h| CharityCandidate {
                relevance: relevance_score(h.raw_score, urgency, confidence, &weights),
                wallet: h.wallet,
                name: h.name,
            })
            .collect())
    }

    /// LLM relevance check. Errors default to relevant so a provider
    /// outage never drops a potentially urgent article.
    async fn relevance_gate(&self, article: &Article) -> llm::RelevanceVerdict {
        if !self.config.llm.is_enabled() {
            return llm::RelevanceVerdict {
                relevant: true,
                reason: String::new(),
            };
        }
        match llm::check_relevance(&self.config.llm, article).await {
            Ok(verdict) => verdict,
            Err(e) => {
                println!("  Relevance check failed, assuming relevant: {:#}", e);
                llm::RelevanceVerdict {
                    relevant: true,
                    reason: String::new(),
                }
            }
        }
    }

    async fn urgency(&self, article: &Article) -> f64 {
        let default = self.config.engine.default_urgency;
        if !self.config.llm.is_enabled() {
            return default;
        }
        match llm::score_urgency(&self.config.llm, article, default).await {
            Ok(score) => score,
            Err(e) => {
                println!("  Urgency scoring failed, using default: {:#}", e);
                default
            }
        }
    }

    async fn record(
        &self,
        article: &Article,
        relevant: bool,
        urgency: Option<f64>,
        top_category: Option<&str>,
    ) -> Result<()> {
        let record = ArticleRecord {
            id: article.dedup_id(),
            link: article.link.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            relevant,
            urgency,
            top_category: top_category.map(|s| s.to_string()),
            processed_at: chrono::Utc::now().timestamp(),
        };
        self.store.record_article(&record).await
    }
}

/// Poll the configured feeds and process every new article. Used by the
/// `watch` command for both single-shot and looping modes.
pub async fn run_watch(
    engine: &Engine,
    config: &Config,
    once: bool,
    interval: Option<u64>,
) -> Result<()> {
    let poll_secs = interval.unwrap_or(config.feeds.poll_secs);
    loop {
        let articles = crate::feeds::fetch_all(&config.feeds).await?;
        println!("Fetched {} article(s) from {} feed(s)", articles.len(), config.feeds.urls.len());

        let mut totals: HashMap<&'static str, usize> = HashMap::new();
        for article in &articles {
            match engine.process_article(article).await {
                Ok(outcome) => {
                    if outcome.skipped_duplicate {
                        *totals.entry("duplicate").or_default() += 1;
                    } else if outcome.relevant {
                        *totals.entry("relevant").or_default() += 1;
                    } else {
                        *totals.entry("irrelevant").or_default() += 1;
                    }
                }
                Err(e) => {
                    println!("Failed to process {}: {:#}", article.link, e);
                    *totals.entry("failed").or_default() += 1;
                }
            }
        }
        println!(
            "Pass complete: {} relevant, {} irrelevant, {} duplicate, {} failed",
            totals.get("relevant").unwrap_or(&0),
            totals.get("irrelevant").unwrap_or(&0),
            totals.get("duplicate").unwrap_or(&0),
            totals.get("failed").unwrap_or(&0),
        );

        if once {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_secs(poll_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use causeway_core::models::{CategoryMatch, Charity, User};
    use causeway_core::store::memory::InMemoryStore;

    fn test_config() -> Config {
        // All providers disabled, no bridge: pure local pipeline.
        toml::from_str("[db]\npath = \":memory:\"\n").unwrap()
    }

    fn unit_vec(dims: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[hot] = 1.0;
        v
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_category_vector("Disaster Relief", &unit_vec(4, 0), "test", 4)
            .await
            .unwrap();
        store
            .upsert_category_vector("Health", &unit_vec(4, 1), "test", 4)
            .await
            .unwrap();
        store
            .upsert_category_vector("Education", &unit_vec(4, 2), "test", 4)
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp();
        let charity = Charity {
            id: "c1".to_string(),
            name: "Relief Fund".to_string(),
            mission: "Emergency response".to_string(),
            url: None,
            wallet: "0x0000000000000000000000000000000000000010".to_string(),
            created_at: now,
            updated_at: now,
        };
        let id = store.upsert_charity(&charity).await.unwrap();
        store
            .set_charity_categories(
                &id,
                &[CategoryMatch {
                    category: "Disaster Relief".to_string(),
                    similarity: 0.9,
                }],
            )
            .await
            .unwrap();
        store
            .upsert_charity_vector(&id, &unit_vec(4, 0), "test", 4)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_match_categories_normalizes() {
        let store = seeded_store().await;
        let engine = Engine::new(test_config(), store, None);

        let cats = engine.match_categories(&unit_vec(4, 0)).await.unwrap();
        assert_eq!(cats.len(), 3);
        assert_eq!(cats[0].0, "Disaster Relief");
        assert!((cats[0].1 - 1.0).abs() < 1e-9);
        assert!((cats.last().unwrap().1 - 0.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_disabled_embeddings_leave_article_unrecorded() {
        let store = seeded_store().await;
        let now = chrono::Utc::now().timestamp();
        let user = User {
            id: "u1".to_string(),
            wallet: "0x0000000000000000000000000000000000000099".to_string(),
            concern: "disaster response".to_string(),
            instant_updates: false,
            created_at: now,
        };
        store
            .upsert_user(
                &user,
                &[CategoryMatch {
                    category: "Disaster Relief".to_string(),
                    similarity: 0.95,
                }],
            )
            .await
            .unwrap();

        let engine = Engine::new(test_config(), store.clone(), None);
        let article = Article {
            title: "Earthquake strikes coastal region".to_string(),
            description: "Thousands displaced".to_string(),
            link: "https://example.org/quake".to_string(),
            published_at: None,
        };

        // Disabled embeddings fail the pipeline before any state change.
        let err = engine.process_article(&article).await;
        assert!(err.is_err());
        assert!(!store.article_seen(&article.link).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_article_skipped() {
        let store = seeded_store().await;
        let article = Article {
            title: "Old news".to_string(),
            description: "Seen before".to_string(),
            link: "https://example.org/old".to_string(),
            published_at: None,
        };
        store
            .record_article(&ArticleRecord {
                id: article.dedup_id(),
                link: article.link.clone(),
                title: article.title.clone(),
                description: article.description.clone(),
                relevant: true,
                urgency: Some(5.0),
                top_category: None,
                processed_at: 0,
            })
            .await
            .unwrap();

        let engine = Engine::new(test_config(), store, None);
        let outcome = engine.process_article(&article).await.unwrap();
        assert!(outcome.skipped_duplicate);
    }
}
