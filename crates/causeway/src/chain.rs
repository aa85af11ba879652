//! Contract bridge: pushes allocations on-chain.
//!
//! The smart contract is reached through the contract-wrapper HTTP
//! service, which signs and submits the actual transactions. This
//! module speaks plain JSON to that service through the
//! [`ContractBridge`] trait, so the engine can run against a mock in
//! tests and entirely chain-free when no bridge is configured.
//!
//! Every mutating call validates its inputs first: wallet addresses
//! must be `0x` + 40 hex chars, percentage lists must match their
//! address lists and sum to exactly 100, and enrollment sends exactly
//! three topics. The wrapper service (and the contract itself) enforce
//! the same rules; failing early keeps a bad allocation from costing a
//! reverted transaction.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::BridgeConfig;
use crate::fault::Fault;

/// A user's on-chain state, as reported by the contract.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainUser {
    pub topics: Vec<String>,
    pub addresses: Vec<String>,
    pub percentages: Vec<u32>,
    /// Contract balance in ether.
    pub balance: f64,
}

/// Interface to the donation-split contract.
#[async_trait]
pub trait ContractBridge: Send + Sync {
    /// Fetch a user's on-chain topics, charities, split, and balance.
    async fn get_user(&self, wallet: &str) -> Result<Option<ChainUser>>;

    /// Enroll a new user with exactly three topics and an initial split.
    async fn enroll(
        &self,
        wallet: &str,
        topics: &[String],
        addresses: &[String],
        percentages: &[u32],
    ) -> Result<()>;

    /// Replace a user's charity split.
    async fn set_charities(
        &self,
        wallet: &str,
        addresses: &[String],
        percentages: &[u32],
    ) -> Result<()>;

    /// Split the user's balance among their current charities.
    async fn split_among_charities(&self, wallet: &str) -> Result<()>;

    /// Donate into the contract on behalf of a wallet. Amount is in wei.
    async fn donate(&self, wallet: &str, amount_wei: u64) -> Result<()>;
}

/// Returns true for a `0x`-prefixed 20-byte hex address.
pub fn is_wallet_address(addr: &str) -> bool {
    match addr.strip_prefix("0x") {
        Some(body) => hex::decode(body).map(|b| b.len() == 20).unwrap_or(false),
        None => false,
    }
}

/// Validate an address/percentage allocation before sending it on-chain.
pub fn validate_allocation(addresses: &[String], percentages: &[u32]) -> Result<()> {
    if addresses.len() != percentages.len() {
        return Err(Fault::bad_request(format!(
            "addresses and percentages must have the same length ({} vs {})",
            addresses.len(),
            percentages.len()
        )));
    }
    if addresses.is_empty() {
        return Err(Fault::bad_request(
            "allocation must contain at least one charity",
        ));
    }
    let total: u32 = percentages.iter().sum();
    if total != 100 {
        return Err(Fault::bad_request(format!(
            "percentages must sum to 100, got {}",
            total
        )));
    }
    for addr in addresses {
        if !is_wallet_address(addr) {
            return Err(Fault::bad_request(format!(
                "invalid wallet address: {}",
                addr
            )));
        }
    }
    Ok(())
}

/// HTTP implementation of [`ContractBridge`] against the
/// contract-wrapper service.
pub struct HttpBridge {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WrapperStatus {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl HttpBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("bridge.base_url not configured"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_checked(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Fault::bridge(format!("Bridge request failed: {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| Fault::bridge(format!("Bridge returned an error status: {}: {}", url, e)))?;

        let status: WrapperStatus = resp
            .json()
            .await
            .map_err(|e| Fault::bridge(format!("Bridge response unreadable: {}: {}", url, e)))?;
        if status.status != "success" {
            return Err(Fault::bridge(format!(
                "Bridge call {} failed: {}",
                path,
                status.message.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContractBridge for HttpBridge {
    async fn get_user(&self, wallet: &str) -> Result<Option<ChainUser>> {
        if !is_wallet_address(wallet) {
            return Err(Fault::bad_request(format!(
                "invalid wallet address: {}",
                wallet
            )));
        }
        let url = format!("{}/users/{}", self.base_url, wallet);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Fault::bridge(format!("Bridge request failed: {}: {}", url, e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| Fault::bridge(format!("Bridge returned an error status: {}: {}", url, e)))?;
        let user: ChainUser = resp
            .json()
            .await
            .map_err(|e| Fault::bridge(format!("Bridge response unreadable: {}: {}", url, e)))?;
        Ok(Some(user))
    }

    async fn enroll(
        &self,
        wallet: &str,
        topics: &[String],
        addresses: &[String],
        percentages: &[u32],
    ) -> Result<()> {
        if topics.len() != 3 {
            return Err(Fault::bad_request(format!(
                "enrollment requires exactly 3 topics, got {}",
                topics.len()
            )));
        }
        if !is_wallet_address(wallet) {
            return Err(Fault::bad_request(format!(
                "invalid wallet address: {}",
                wallet
            )));
        }
        validate_allocation(addresses, percentages)?;

        self.post_checked(
            "/enroll",
            serde_json::json!({
                "wallet": wallet,
                "topics": topics,
                "charities": addresses,
                "percentages": percentages,
            }),
        )
        .await
    }

    async fn set_charities(
        &self,
        wallet: &str,
        addresses: &[String],
        percentages: &[u32],
    ) -> Result<()> {
        if !is_wallet_address(wallet) {
            return Err(Fault::bad_request(format!(
                "invalid wallet address: {}",
                wallet
            )));
        }
        validate_allocation(addresses, percentages)?;

        self.post_checked(
            "/set_charities",
            serde_json::json!({
                "wallet": wallet,
                "charities": addresses,
                "percentages": percentages,
            }),
        )
        .await
    }

    async fn split_among_charities(&self, wallet: &str) -> Result<()> {
        if !is_wallet_address(wallet) {
            return Err(Fault::bad_request(format!(
                "invalid wallet address: {}",
                wallet
            )));
        }
        self.post_checked("/split", serde_json::json!({ "wallet": wallet }))
            .await
    }

    async fn donate(&self, wallet: &str, amount_wei: u64) -> Result<()> {
        if amount_wei == 0 {
            return Err(Fault::bad_request("donation amount must be greater than 0"));
        }
        if !is_wallet_address(wallet) {
            return Err(Fault::bad_request(format!(
                "invalid wallet address: {}",
                wallet
            )));
        }
        self.post_checked(
            "/donate",
            serde_json::json!({ "wallet": wallet, "amount": amount_wei }),
        )
        .await
    }
}

/// Build the bridge from config, or `None` for chain-free mode.
pub fn create_bridge(config: &BridgeConfig) -> Result<Option<std::sync::Arc<dyn ContractBridge>>> {
    if config.is_enabled() {
        Ok(Some(std::sync::Arc::new(HttpBridge::new(config)?)))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_validation() {
        assert!(is_wallet_address(
            "0x01786AA502BEeF1862691399C5A526E4Ce16F43d"
        ));
        assert!(!is_wallet_address("01786AA502BEeF1862691399C5A526E4Ce16F43d"));
        assert!(!is_wallet_address("0x1234"));
        assert!(!is_wallet_address("0xZZ786AA502BEeF1862691399C5A526E4Ce16F43d"));
        assert!(!is_wallet_address(""));
    }

    #[test]
    fn test_validate_allocation_ok() {
        let addrs = vec![
            "0x0000000000000000000000000000000000000001".to_string(),
            "0x0000000000000000000000000000000000000002".to_string(),
        ];
        assert!(validate_allocation(&addrs, &[60, 40]).is_ok());
    }

    #[test]
    fn test_validate_allocation_bad_sum() {
        let addrs = vec!["0x0000000000000000000000000000000000000001".to_string()];
        assert!(validate_allocation(&addrs, &[99]).is_err());
    }

    #[test]
    fn test_validate_allocation_length_mismatch() {
        let addrs = vec!["0x0000000000000000000000000000000000000001".to_string()];
        assert!(validate_allocation(&addrs, &[50, 50]).is_err());
    }

    #[test]
    fn test_validate_allocation_empty() {
        assert!(validate_allocation(&[], &[]).is_err());
    }

    #[test]
    fn test_validate_allocation_bad_address() {
        let addrs = vec!["not-an-address".to_string()];
        assert!(validate_allocation(&addrs, &[100]).is_err());
    }

    fn unroutable_bridge() -> HttpBridge {
        let config = BridgeConfig {
            base_url: Some("http://127.0.0.1:1".to_string()),
            timeout_secs: 1,
        };
        HttpBridge::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_enroll_rejects_empty_split() {
        let bridge = unroutable_bridge();
        let topics = vec![
            "Disaster Relief".to_string(),
            "Health".to_string(),
            "Education".to_string(),
        ];
        let err = bridge
            .enroll(
                "0x0000000000000000000000000000000000000001",
                &topics,
                &[],
                &[],
            )
            .await
            .unwrap_err();
        // Validation fires before the request is sent.
        assert!(err.to_string().contains("at least one charity"));
    }

    #[tokio::test]
    async fn test_enroll_rejects_wrong_topic_count() {
        let bridge = unroutable_bridge();
        let addrs = vec!["0x0000000000000000000000000000000000000002".to_string()];
        let err = bridge
            .enroll(
                "0x0000000000000000000000000000000000000001",
                &["Health".to_string()],
                &addrs,
                &[100],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exactly 3 topics"));
    }
}
