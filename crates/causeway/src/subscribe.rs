//! The `subscribe` command: register a user by stated concern.
//!
//! Embeds the user's free-text concern, matches it against the category
//! vectors, and stores the user with their top categories and
//! confidence scores. When a contract bridge is configured the user is
//! also enrolled on-chain with those categories as topics and an even
//! initial split over the charities nearest the concern; the contract
//! requires every enrollment to carry a split summing to 100.

use anyhow::Result;
use std::sync::Arc;

use causeway_core::models::{CategoryMatch, Holding, User};
use causeway_core::rebalance::largest_remainder;
use causeway_core::score::normalize_similarities;
use causeway_core::store::{CharityHit, Store};

use crate::chain::{is_wallet_address, ContractBridge};
use crate::config::Config;
use crate::embedding::{create_provider, embed_query};
use crate::fault::Fault;

/// How many charities the initial on-chain split holds at most.
const INITIAL_SPLIT_SIZE: usize = 3;

/// Build the even initial split from charity hits, best match first.
///
/// Hits without a usable wallet are skipped. Percentages come from the
/// largest-remainder rounding of equal weights, so they sum to exactly
/// 100 whenever the result is non-empty.
fn initial_split(hits: &[CharityHit]) -> Vec<Holding> {
    let picked: Vec<&CharityHit> = hits
        .iter()
        .filter(|h| is_wallet_address(&h.wallet))
        .take(INITIAL_SPLIT_SIZE)
        .collect();
    let percentages = largest_remainder(&vec![1.0; picked.len()], 100);
    picked
        .into_iter()
        .zip(percentages)
        .map(|(h, percentage)| Holding {
            wallet: h.wallet.clone(),
            name: Some(h.name.clone()),
            percentage,
        })
        .collect()
}

/// Match a concern against the category vectors and create the user.
///
/// Returns the stored user and their category matches, best first.
/// Shared by the CLI command and the `POST /users` endpoint.
pub async fn subscribe_user(
    config: &Config,
    store: &dyn Store,
    bridge: Option<&Arc<dyn ContractBridge>>,
    concern: &str,
    wallet: &str,
    instant_updates: bool,
) -> Result<(User, Vec<CategoryMatch>)> {
    let concern = concern.trim();
    if concern.is_empty() {
        return Err(Fault::bad_request("concern must not be empty"));
    }
    if !is_wallet_address(wallet) {
        return Err(Fault::bad_request(format!(
            "invalid wallet address: {}",
            wallet
        )));
    }

    let provider = create_provider(&config.embedding)?;
    let query = embed_query(provider.as_ref(), &config.embedding, concern).await?;
    let hits = store
        .category_search(&query, config.engine.category_top_k)
        .await?;
    if hits.is_empty() {
        return Err(Fault::bad_request(
            "no category vectors loaded; run `cwy load` first",
        ));
    }

    let raw: Vec<f64> = hits.iter().map(|h| h.raw_score).collect();
    let normalized = normalize_similarities(&raw);
    let matches: Vec<CategoryMatch> = hits
        .into_iter()
        .zip(normalized)
        .map(|(h, confidence)| CategoryMatch {
            category: h.category,
            similarity: confidence.clamp(0.0, 1.0),
        })
        .collect();

    // Resolve the enrollment payload before storing anything, so a
    // rejected enrollment cannot leave a half-registered user behind.
    let enrollment = match bridge {
        Some(_) => {
            if matches.len() < 3 {
                return Err(Fault::bad_request(format!(
                    "on-chain enrollment requires 3 matched topics, got {}",
                    matches.len()
                )));
            }
            let topics: Vec<String> =
                matches.iter().take(3).map(|m| m.category.clone()).collect();
            let charity_hits = store
                .charity_search(&query, None, INITIAL_SPLIT_SIZE)
                .await?;
            let split = initial_split(&charity_hits);
            if split.is_empty() {
                return Err(Fault::bad_request(
                    "no charities loaded for the initial split; run `cwy load` first",
                ));
            }
            Some((topics, split))
        }
        None => None,
    };

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        wallet: wallet.to_string(),
        concern: concern.to_string(),
        instant_updates,
        created_at: chrono::Utc::now().timestamp(),
    };
    store.upsert_user(&user, &matches).await?;

    if let (Some(bridge), Some((topics, split))) = (bridge, enrollment) {
        let addresses: Vec<String> = split.iter().map(|h| h.wallet.clone()).collect();
        let percentages: Vec<u32> = split.iter().map(|h| h.percentage).collect();
        bridge
            .enroll(wallet, &topics, &addresses, &percentages)
            .await?;
        store.replace_portfolio(&user.id, &split).await?;
    }

    Ok((user, matches))
}

pub async fn run_subscribe(
    config: &Config,
    store: Arc<dyn Store>,
    bridge: Option<Arc<dyn ContractBridge>>,
    concern: &str,
    wallet: &str,
    instant_updates: bool,
) -> Result<()> {
    let (user, matches) = subscribe_user(
        config,
        store.as_ref(),
        bridge.as_ref(),
        concern,
        wallet,
        instant_updates,
    )
    .await?;

    println!("subscribed {}", user.id);
    println!("  wallet:  {}", user.wallet);
    println!("  concern: {}", user.concern);
    for m in &matches {
        println!("  {} ({:.2})", m.category, m.similarity);
    }
    if bridge.is_some() {
        println!("  enrolled on-chain");
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(wallet: &str, name: &str) -> CharityHit {
        CharityHit {
            id: name.to_lowercase(),
            name: name.to_string(),
            mission: String::new(),
            wallet: wallet.to_string(),
            raw_score: 0.8,
        }
    }

    #[test]
    fn test_initial_split_three_way() {
        let hits = vec![
            hit("0x0000000000000000000000000000000000000001", "Relief Fund"),
            hit("0x0000000000000000000000000000000000000002", "School Trust"),
            hit("0x0000000000000000000000000000000000000003", "Water Works"),
        ];
        let split = initial_split(&hits);
        assert_eq!(split.len(), 3);
        assert_eq!(split.iter().map(|h| h.percentage).sum::<u32>(), 100);
        assert_eq!(split[0].name.as_deref(), Some("Relief Fund"));
    }

    #[test]
    fn test_initial_split_skips_bad_wallets() {
        let hits = vec![
            hit("not-an-address", "Broken"),
            hit("0x0000000000000000000000000000000000000002", "School Trust"),
        ];
        let split = initial_split(&hits);
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].percentage, 100);
    }

    #[test]
    fn test_initial_split_empty_without_usable_hits() {
        assert!(initial_split(&[]).is_empty());
        assert!(initial_split(&[hit("0xbad", "Broken")]).is_empty());
    }
}
