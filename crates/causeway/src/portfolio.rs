//! The `portfolio` command: show a user's donation split.
//!
//! Prints the on-chain portfolio when a bridge is configured, falling
//! back to the local mirror otherwise.

use anyhow::{bail, Result};
use std::sync::Arc;

use causeway_core::models::Holding;
use causeway_core::store::Store;

use crate::chain::ContractBridge;

pub async fn run_portfolio(
    store: Arc<dyn Store>,
    bridge: Option<Arc<dyn ContractBridge>>,
    user_id: &str,
) -> Result<()> {
    let Some(user) = store.get_user(user_id).await? else {
        bail!("user not found: {}", user_id);
    };

    let (holdings, source) = match &bridge {
        Some(bridge) => match bridge.get_user(&user.wallet).await? {
            Some(chain_user) => {
                let names = store
                    .charity_names_by_wallets(&chain_user.addresses)
                    .await?;
                let holdings: Vec<Holding> = chain_user
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
                (holdings, "on-chain")
            }
            None => bail!("user {} is not enrolled on-chain", user_id),
        },
        None => (store.portfolio(user_id).await?, "local mirror"),
    };

    println!("portfolio {} ({})", user_id, source);
    println!("  wallet: {}", user.wallet);
    if holdings.is_empty() {
        println!("  (empty)");
        return Ok(());
    }
    for h in &holdings {
        println!(
            "  {:>3}%  {}  {}",
            h.percentage,
            h.wallet,
            h.name.as_deref().unwrap_or("(unknown charity)")
        );
    }
    let total: u32 = holdings.iter().map(|h| h.percentage).sum();
    println!("  total: {}%", total);
    Ok(())
}
