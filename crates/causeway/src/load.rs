//! The `load` command: ingest a charity catalog.
//!
//! Reads a JSON catalog of charities (name, mission, url, wallet),
//! upserts them into the store, and, when an embedding provider is
//! configured, seeds the category label vectors, embeds each mission,
//! and assigns the top categories by similarity.
//!
//! Without embeddings only the charity rows are written; categorization
//! can be backfilled later by running `load` again with a provider
//! configured.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use causeway_core::categories::CATEGORIES;
use causeway_core::models::{CategoryMatch, Charity};
use causeway_core::store::Store;

use crate::chain::is_wallet_address;
use crate::config::Config;
use crate::embedding::{create_provider, embed_texts, EmbeddingProvider};

/// One catalog entry as it appears in the JSON file.
#[derive(Debug, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub mission: String,
    #[serde(default)]
    pub url: Option<String>,
    pub wallet: String,
}

pub async fn run_load(config: &Config, store: Arc<dyn Store>, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let entries: Vec<CatalogEntry> =
        serde_json::from_str(&raw).context("Catalog must be a JSON array of charities")?;

    let mut upserted = 0;
    let mut skipped = 0;
    let mut ids = Vec::with_capacity(entries.len());

    let now = chrono::Utc::now().timestamp();
    for entry in &entries {
        if !is_wallet_address(&entry.wallet) {
            eprintln!(
                "Warning: skipping {} (invalid wallet {})",
                entry.name, entry.wallet
            );
            skipped += 1;
            continue;
        }
        let charity = Charity {
            id: uuid::Uuid::new_v4().to_string(),
            name: entry.name.clone(),
            mission: entry.mission.clone(),
            url: entry.url.clone(),
            wallet: entry.wallet.clone(),
            created_at: now,
            updated_at: now,
        };
        let id = store.upsert_charity(&charity).await?;
        ids.push((id, entry));
        upserted += 1;
    }

    let mut categorized = 0;
    if config.embedding.is_enabled() {
        let provider = create_provider(&config.embedding)?;
        seed_category_vectors(provider.as_ref(), config, store.as_ref()).await?;
        categorized =
            categorize_charities(provider.as_ref(), config, store.as_ref(), &ids).await?;
    }

    println!("load {}", path.display());
    println!("  catalog entries: {}", entries.len());
    println!("  upserted charities: {}", upserted);
    if skipped > 0 {
        println!("  skipped (invalid wallet): {}", skipped);
    }
    if config.embedding.is_enabled() {
        println!("  categorized: {}", categorized);
    } else {
        println!("  categorization skipped (embeddings disabled)");
    }
    println!("ok");
    Ok(())
}

/// Embed and store the category label vectors, once.
///
/// Labels never change, so vectors are only written when some are
/// missing (for example after switching embedding models and wiping
/// the table).
async fn seed_category_vectors(
    provider: &dyn EmbeddingProvider,
    config: &Config,
    store: &dyn Store,
) -> Result<()> {
    if store.category_vector_count().await? >= CATEGORIES.len() {
        return Ok(());
    }
    let labels: Vec<String> = CATEGORIES.iter().map(|c| c.to_string()).collect();
    let vectors = embed_texts(provider, &config.embedding, &labels).await?;
    for (label, vector) in labels.iter().zip(vectors.iter()) {
        store
            .upsert_category_vector(label, vector, provider.model_name(), vector.len())
            .await?;
    }
    println!("  seeded {} category vectors", CATEGORIES.len());
    Ok(())
}

/// Embed charity missions in batches and assign top categories.
async fn categorize_charities(
    provider: &dyn EmbeddingProvider,
    config: &Config,
    store: &dyn Store,
    charities: &[(String, &CatalogEntry)],
) -> Result<usize> {
    let mut categorized = 0;

    for batch in charities.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch
            .iter()
            .map(|(_, e)| format!("{}: {}", e.name, e.mission))
            .collect();
        let vectors = match embed_texts(provider, &config.embedding, &texts).await {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                continue;
            }
        };

        for ((id, _), vector) in batch.iter().zip(vectors.iter()) {
            store
                .upsert_charity_vector(id, vector, provider.model_name(), vector.len())
                .await?;

            let hits = store
                .category_search(vector, config.engine.category_top_k)
                .await?;
            let matches: Vec<CategoryMatch> = hits
                .into_iter()
                .map(|h| CategoryMatch {
                    category: h.category,
                    similarity: h.raw_score.clamp(0.0, 1.0),
                })
                .collect();
            store.set_charity_categories(id, &matches).await?;
            categorized += 1;
        }
    }
    Ok(categorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_parses() {
        let json = r#"[
            {"name": "Relief Fund", "mission": "Emergency aid",
             "wallet": "0x0000000000000000000000000000000000000001"},
            {"name": "School Trust", "mission": "Education access",
             "url": "https://schools.example.org",
             "wallet": "0x0000000000000000000000000000000000000002"}
        ]"#;
        let entries: Vec<CatalogEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].url.is_none());
        assert_eq!(entries[1].url.as_deref(), Some("https://schools.example.org"));
    }
}
