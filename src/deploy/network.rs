// Network configuration - which chains are local and where live feeds live

use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Networks that get a mock price feed instead of a live one
pub const DEVELOPMENT_CHAINS: &[&str] = &["hardhat", "localhost"];

/// Chain ID used by local development networks
pub const LOCAL_CHAIN_ID: u64 = 31337;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid network configuration: {0}")]
    InvalidConfig(String),
}

/// Per-network deployment parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// Live native/USD feed; None on development networks
    pub eth_usd_price_feed: Option<Address>,
    /// Confirmations to wait for after deploying
    pub block_confirmations: u32,
}

impl NetworkConfig {
    pub fn new(name: &str, chain_id: u64) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            eth_usd_price_feed: None,
            block_confirmations: 1,
        }
    }

    pub fn with_price_feed(mut self, feed: Address) -> Self {
        self.eth_usd_price_feed = Some(feed);
        self
    }

    pub fn with_block_confirmations(mut self, confirmations: u32) -> Self {
        self.block_confirmations = confirmations;
        self
    }

    /// True for local networks that use the mock feed
    pub fn is_development(&self) -> bool {
        DEVELOPMENT_CHAINS.contains(&self.name.as_str())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.name.trim().is_empty() {
            return Err(NetworkError::InvalidConfig("name cannot be empty".to_string()));
        }
        if self.block_confirmations == 0 {
            return Err(NetworkError::InvalidConfig(
                "block_confirmations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Known networks by name
#[derive(Clone, Debug, Default)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, NetworkConfig>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Development networks plus the public networks with known feeds
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for name in DEVELOPMENT_CHAINS {
            registry.register(NetworkConfig::new(name, LOCAL_CHAIN_ID));
        }

        // Feed addresses are compile-time constants; parse cannot fail
        if let Ok(feed) = Address::parse("0xD4a33860578De61DBAbDc8BFdb98FD742fA7028e") {
            registry.register(
                NetworkConfig::new("goerli", 5)
                    .with_price_feed(feed)
                    .with_block_confirmations(6),
            );
        }
        if let Ok(feed) = Address::parse("0xF9680D99D6C9589e2a93a78A04A279e509205945") {
            registry.register(NetworkConfig::new("polygon", 137).with_price_feed(feed));
        }
        registry
    }

    /// Add or replace a network
    pub fn register(&mut self, config: NetworkConfig) {
        self.networks.insert(config.name.clone(), config);
    }

    /// Look up a network by name
    pub fn get(&self, name: &str) -> Result<&NetworkConfig, NetworkError> {
        self.networks
            .get(name)
            .ok_or_else(|| NetworkError::UnknownNetwork(name.to_string()))
    }

    /// Look up a public network by chain ID
    pub fn by_chain_id(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks
            .values()
            .find(|n| n.chain_id == chain_id && !n.is_development())
    }

    /// Names of all registered networks
    pub fn names(&self) -> Vec<&str> {
        self.networks.keys().map(|k| k.as_str()).collect()
    }
}
