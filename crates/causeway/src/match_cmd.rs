//! The `match` command: dry-run analysis of a single article.
//!
//! Runs the relevance gate, category match, charity search, and
//! urgency scoring for an ad hoc article and prints the results
//! without touching any portfolio or recording the article.

use anyhow::Result;

use causeway_core::models::Article;

use crate::engine::Engine;

pub async fn run_match(engine: &Engine, title: &str, description: &str) -> Result<()> {
    let article = Article {
        title: title.to_string(),
        description: description.to_string(),
        // Dry runs are never recorded; the link only feeds dedup.
        link: format!("cwy-match:{}", title),
        published_at: None,
    };

    let analysis = engine.analyze(&article).await?;

    println!("match \"{}\"", title);
    if !analysis.relevant {
        if analysis.reason.is_empty() {
            println!("  not relevant");
        } else {
            println!("  not relevant: {}", analysis.reason);
        }
        return Ok(());
    }

    println!("  urgency: {:.1}/10", analysis.urgency);
    println!("  categories:");
    for (category, confidence) in &analysis.categories {
        println!("    {} ({:.2})", category, confidence);
    }
    println!("  charities:");
    if analysis.charities.is_empty() {
        println!("    (none indexed for the top category)");
    }
    for c in &analysis.charities {
        println!("    {} {} ({:.2})", c.name, c.wallet, c.relevance);
    }
    Ok(())
}
