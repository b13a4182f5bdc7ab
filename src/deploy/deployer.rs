// Deployer - brings up the mock feed and the funding ledger on a network
//
// Development networks get a MockPriceFeed; any other network must be
// given a live oracle matching the feed address configured for it.

use crate::deploy::network::{NetworkConfig, NetworkError};
use crate::deploy::verify::{verify, VerificationOutcome, VerificationService};
use crate::identity::Address;
use crate::ledger::{FundingLedger, LedgerConfig, LedgerError, PayoutTarget};
use crate::oracle::{MockPriceFeed, PriceOracle, DECIMALS, INITIAL_ANSWER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const MOCK_FEED_NAME: &str = "MockV3Aggregator";
pub const FUND_ME_NAME: &str = "FundMe";

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Mock price feed has not been deployed on {0}")]
    MocksNotDeployed(String),

    #[error("No price feed configured for network {0}")]
    NoPriceFeed(String),

    #[error("Price feed mismatch: network expects {expected}, oracle is {actual}")]
    FeedMismatch { expected: Address, actual: Address },

    #[error("Ledger construction failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Record of one deployed contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    pub deployer: Address,
    pub args: Vec<String>,
    pub network: String,
    pub nonce: u64,
    pub deployed_at: i64,
}

impl DeploymentRecord {
    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// A freshly deployed ledger with its bookkeeping
#[derive(Debug)]
pub struct Deployment {
    pub ledger: FundingLedger,
    pub record: DeploymentRecord,
    /// None on development networks or when no service was given
    pub verification: Option<VerificationOutcome>,
}

/// Deploys contracts from one account, tracking its nonce
pub struct Deployer {
    network: NetworkConfig,
    deployer: Address,
    nonce: u64,
    ledger_config: LedgerConfig,
    mock_feed: Option<Arc<MockPriceFeed>>,
    records: Vec<DeploymentRecord>,
}

impl Deployer {
    pub fn new(network: NetworkConfig, deployer: Address) -> Result<Self, DeployError> {
        network.validate()?;
        Ok(Self {
            network,
            deployer,
            nonce: 0,
            ledger_config: LedgerConfig::default(),
            mock_feed: None,
            records: Vec::new(),
        })
    }

    /// Continue from a previously used nonce
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_ledger_config(mut self, config: LedgerConfig) -> Self {
        self.ledger_config = config;
        self
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn deployer(&self) -> &Address {
        &self.deployer
    }

    /// Next nonce the deployer will use
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Everything deployed so far, in order
    pub fn records(&self) -> &[DeploymentRecord] {
        &self.records
    }

    /// The mock feed, if one was deployed
    pub fn mock_feed(&self) -> Option<Arc<MockPriceFeed>> {
        self.mock_feed.clone()
    }

    fn record(&mut self, name: &str, args: Vec<String>) -> DeploymentRecord {
        let nonce = self.nonce;
        self.nonce += 1;
        let record = DeploymentRecord {
            name: name.to_string(),
            address: Address::for_contract(&self.deployer, nonce),
            deployer: self.deployer,
            args,
            network: self.network.name.clone(),
            nonce,
            deployed_at: chrono::Utc::now().timestamp(),
        };
        info!(
            contract = name,
            address = %record.address,
            network = %record.network,
            confirmations = self.network.block_confirmations,
            "Deployed"
        );
        self.records.push(record.clone());
        record
    }

    /// Deploy the mock feed on development networks; no-op elsewhere
    pub fn deploy_mocks(&mut self) -> Option<Arc<MockPriceFeed>> {
        if !self.network.is_development() {
            return None;
        }
        if let Some(feed) = &self.mock_feed {
            return Some(Arc::clone(feed));
        }

        info!(network = %self.network.name, "Local network detected, deploying mocks");
        let record = self.record(
            MOCK_FEED_NAME,
            vec![DECIMALS.to_string(), INITIAL_ANSWER.to_string()],
        );
        let feed = Arc::new(MockPriceFeed::new(record.address, DECIMALS, INITIAL_ANSWER));
        self.mock_feed = Some(Arc::clone(&feed));
        Some(feed)
    }

    /// Deploy the ledger, owned by the deployer
    ///
    /// `live_feed` is ignored on development networks. Verification only
    /// runs on public networks and never fails the deployment.
    pub async fn deploy_fund_me(
        &mut self,
        live_feed: Option<Arc<dyn PriceOracle>>,
        payout: Arc<dyn PayoutTarget>,
        verifier: Option<&dyn VerificationService>,
    ) -> Result<Deployment, DeployError> {
        let oracle: Arc<dyn PriceOracle> = if self.network.is_development() {
            let feed: Arc<dyn PriceOracle> = self
                .mock_feed
                .clone()
                .ok_or_else(|| DeployError::MocksNotDeployed(self.network.name.clone()))?;
            feed
        } else {
            let expected = self
                .network
                .eth_usd_price_feed
                .ok_or_else(|| DeployError::NoPriceFeed(self.network.name.clone()))?;
            let live = live_feed.ok_or_else(|| DeployError::NoPriceFeed(self.network.name.clone()))?;
            if live.address() != expected {
                return Err(DeployError::FeedMismatch {
                    expected,
                    actual: live.address(),
                });
            }
            live
        };

        let ledger = FundingLedger::with_config(
            self.ledger_config.clone(),
            self.deployer,
            oracle,
            payout,
        )?;
        let args = vec![ledger.price_feed().to_string()];
        let record = self.record(FUND_ME_NAME, args.clone());

        let verification = match verifier {
            Some(service) if !self.network.is_development() => {
                Some(verify(service, record.address, args).await)
            }
            _ => None,
        };

        Ok(Deployment {
            ledger,
            record,
            verification,
        })
    }

    /// Deploy mocks (on development networks) and then the ledger
    pub async fn deploy_all(
        &mut self,
        live_feed: Option<Arc<dyn PriceOracle>>,
        payout: Arc<dyn PayoutTarget>,
        verifier: Option<&dyn VerificationService>,
    ) -> Result<Deployment, DeployError> {
        self.deploy_mocks();
        self.deploy_fund_me(live_feed, payout, verifier).await
    }
}
