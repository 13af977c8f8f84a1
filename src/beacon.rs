//! # Randomness Beacon Gateway Client
//!
//! HTTP client for a drand-style beacon gateway, behind a narrow trait so
//! protocol code can run against a test double. The gateway is the trustless
//! clock of the system: its chain parameters map wall-clock times to rounds,
//! and its per-round signatures are the timelock decryption keys.

use crate::config::network;
use crate::error::{WalletError, WalletResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;

/// Beacon chain parameters, fetched once from `GET /info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Long-term chain public key (compressed G1, hex)
    pub public_key: String,
    /// Seconds between rounds
    pub period: u64,
    /// Unix timestamp of round 1
    pub genesis_time: u64,
    /// Chain hash identifier
    #[serde(default)]
    pub hash: String,
}

impl ChainInfo {
    /// Unix timestamp at which the signature for `round` becomes available
    pub fn time_of_round(&self, round: u64) -> u64 {
        self.genesis_time + round.saturating_sub(1) * self.period
    }
}

/// One published beacon round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSignature {
    pub round: u64,
    /// Threshold BLS signature over the round (compressed G2, hex)
    pub signature: String,
}

/// Narrow interface over the beacon gateway, swappable for a test double
#[async_trait]
pub trait BeaconGateway: Send + Sync {
    /// Fetch the chain parameters
    async fn chain_info(&self) -> WalletResult<ChainInfo>;

    /// Fetch the signature for a round. Fails with `RoundNotReady` when the
    /// beacon has not yet published it.
    async fn signature_for_round(&self, round: u64) -> WalletResult<RoundSignature>;
}

/// HTTP client for a drand gateway
#[derive(Debug)]
pub struct HttpBeaconClient {
    client: Client,
    base_url: String,
}

impl HttpBeaconClient {
    /// Create a client for a gateway base URL
    pub fn new(base_url: impl Into<String>) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(network::REQUEST_TIMEOUT)
            .user_agent(network::BEACON_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create a client with the gateway URL from the environment or default
    pub fn from_env() -> WalletResult<Self> {
        dotenv::dotenv().ok();
        let base_url = env::var(crate::config::env::BEACON_URL)
            .unwrap_or_else(|_| network::DEFAULT_BEACON_URL.to_string());
        Self::new(base_url)
    }
}

#[async_trait]
impl BeaconGateway for HttpBeaconClient {
    async fn chain_info(&self) -> WalletResult<ChainInfo> {
        let url = format!("{}/info", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(WalletError::InvalidBeaconResponse {
                message: format!("HTTP {} fetching chain info", response.status()),
            });
        }
        let info: ChainInfo = response.json().await?;
        if info.period == 0 {
            return Err(WalletError::InvalidBeaconResponse {
                message: "chain period must be positive".to_string(),
            });
        }
        Ok(info)
    }

    async fn signature_for_round(&self, round: u64) -> WalletResult<RoundSignature> {
        let url = format!("{}/public/{}", self.base_url, round);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(WalletError::RoundNotReady { round }),
            status if !status.is_success() => Err(WalletError::InvalidBeaconResponse {
                message: format!("HTTP {} fetching round {}", status, round),
            }),
            _ => Ok(response.json().await?),
        }
    }
}

/// Poll the gateway until the signature for `round` is published.
///
/// Bounded by `ROUND_POLL_ATTEMPTS`; a beacon outage surfaces as the last
/// error instead of retrying forever. Only retryable failures (round not
/// ready, transport) are polled through.
pub async fn wait_for_signature(
    gateway: &dyn BeaconGateway,
    round: u64,
) -> WalletResult<RoundSignature> {
    let mut attempts = 0u32;
    loop {
        match gateway.signature_for_round(round).await {
            Ok(signature) => return Ok(signature),
            Err(error) if error.is_retryable() => {
                attempts += 1;
                if attempts >= network::ROUND_POLL_ATTEMPTS {
                    return Err(error);
                }
                log::debug!(
                    "round {} not available yet (attempt {}): {}",
                    round,
                    attempts,
                    error
                );
                tokio::time::sleep(network::ROUND_POLL_INTERVAL).await;
            }
            Err(error) => return Err(error),
        }
    }
}
