// Harness session - one open data directory on one network
//
// Every operation that moves native currency writes the account book back
// before returning, on failure as well as on success. A new account's
// starting balance is persisted together with its keypair.

use crate::deploy::{
    DeployError, Deployer, DeploymentRecord, NetworkConfig, NetworkError, NetworkRegistry,
    FUND_ME_NAME, MOCK_FEED_NAME,
};
use crate::identity::{Address, Keypair};
use crate::ledger::{
    parse_ether, AccountBook, ContributionReceipt, FundingLedger, LedgerError, LedgerEvent,
    UnitsError, WithdrawalReceipt, WEI_PER_ETHER,
};
use crate::oracle::{
    MockPriceFeed, OracleError, PriceOracle, RemoteFeedConfig, RemotePriceFeed, RoundData,
};
use crate::storage::{FundMeStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Native balance given to every newly created account
pub const INITIAL_ACCOUNT_BALANCE: u128 = 10_000 * WEI_PER_ETHER;

pub const DEPLOYER: &str = "deployer";
pub const USER: &str = "user";

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error("Account error: {0}")]
    Account(String),

    #[error("{0} has not been deployed; run `fundme deploy` first")]
    NotDeployed(&'static str),

    #[error("Ledger was deployed on {deployed}, not {requested}")]
    NetworkMismatch { deployed: String, requested: String },

    #[error("No live feed endpoint for {0}; pass --feed-endpoint to deploy")]
    NoFeedEndpoint(String),

    #[error("Mock prices only apply on development networks; {0} uses a live feed")]
    NotDevelopment(String),
}

/// One named account and its native balance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSummary {
    pub label: String,
    pub address: Address,
    pub balance: u128,
}

/// Result of a deploy
#[derive(Clone, Debug)]
pub struct DeploySummary {
    pub record: DeploymentRecord,
    pub price_feed: Address,
}

/// Snapshot of the deployed ledger and the current price
#[derive(Clone, Debug)]
pub struct LedgerStatus {
    pub network: String,
    pub owner: Address,
    pub price_feed: Address,
    pub round: RoundData,
    /// USD value of one ether at the current price
    pub price_usd: u128,
    pub minimum_usd: u128,
    pub minimum_contribution: u128,
    pub held: u128,
    /// Funders in contribution order with their balances
    pub funders: Vec<(Address, u128)>,
}

/// Everything a command needs: the store, the network and native balances
pub struct Harness {
    store: FundMeStore,
    network: NetworkConfig,
    book: Arc<AccountBook>,
}

impl Harness {
    /// Open the data directory for a network from the builtin registry
    pub fn open(data_dir: &Path, network: &str) -> Result<Self, HarnessError> {
        let network = NetworkRegistry::builtin().get(network)?.clone();
        Self::open_with_network(data_dir, network)
    }

    pub fn open_with_network(data_dir: &Path, network: NetworkConfig) -> Result<Self, HarnessError> {
        network.validate()?;
        let store = FundMeStore::open(data_dir)?;
        let book = match store.load_account_book()? {
            Some(state) => AccountBook::from_state(state),
            None => AccountBook::new(),
        };
        Ok(Self {
            store,
            network,
            book: Arc::new(book),
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn store(&self) -> &FundMeStore {
        &self.store
    }

    /// Native balance of an address
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.book.balance_of(address)
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Load or create a named account
    ///
    /// A new account is credited with INITIAL_ACCOUNT_BALANCE and the book is
    /// flushed before the address is returned.
    pub fn account(&self, label: &str) -> Result<Address, HarnessError> {
        if let Some(keypair) = self.store.load_keypair(label)? {
            return Ok(keypair.address());
        }

        let keypair = Keypair::generate();
        let address = keypair.address();
        self.book
            .credit(&address, INITIAL_ACCOUNT_BALANCE)
            .map_err(HarnessError::Account)?;
        self.store.save_keypair(label, &keypair)?;
        self.save_book()?;
        info!(account = label, address = %address, "Created account");
        Ok(address)
    }

    /// Label of the account at a position: deployer, user, then accountN
    pub fn account_label(index: usize) -> String {
        match index {
            0 => DEPLOYER.to_string(),
            1 => USER.to_string(),
            n => format!("account{}", n),
        }
    }

    /// The first `count` accounts, created on demand
    pub fn accounts(&self, count: usize) -> Result<Vec<AccountSummary>, HarnessError> {
        (0..count)
            .map(|index| {
                let label = Self::account_label(index);
                let address = self.account(&label)?;
                Ok(AccountSummary {
                    balance: self.book.balance_of(&address),
                    label,
                    address,
                })
            })
            .collect()
    }

    // ========================================================================
    // FEEDS AND LEDGER
    // ========================================================================

    fn mock_feed(&self) -> Result<Arc<MockPriceFeed>, HarnessError> {
        let record = self
            .store
            .load_deployment(MOCK_FEED_NAME)?
            .ok_or(HarnessError::NotDeployed(MOCK_FEED_NAME))?;
        let feed = match self.store.load_mock_round()? {
            Some(round) => MockPriceFeed::from_round(record.address, round),
            None => MockPriceFeed::with_defaults(record.address),
        };
        Ok(Arc::new(feed))
    }

    fn remote_feed(&self) -> Result<Arc<RemotePriceFeed>, HarnessError> {
        let endpoint = self
            .store
            .load_feed_endpoint()?
            .ok_or_else(|| HarnessError::NoFeedEndpoint(self.network.name.clone()))?;
        let address = self
            .network
            .eth_usd_price_feed
            .ok_or_else(|| DeployError::NoPriceFeed(self.network.name.clone()))?;
        let feed = RemotePriceFeed::new(RemoteFeedConfig::new(&endpoint, address))?;
        Ok(Arc::new(feed))
    }

    /// The mock feed on development networks, the live adapter elsewhere
    pub fn oracle(&self) -> Result<Arc<dyn PriceOracle>, HarnessError> {
        if self.network.is_development() {
            let feed: Arc<dyn PriceOracle> = self.mock_feed()?;
            Ok(feed)
        } else {
            let feed: Arc<dyn PriceOracle> = self.remote_feed()?;
            Ok(feed)
        }
    }

    /// Rebuild the deployed ledger from its snapshot
    pub fn ledger(&self) -> Result<FundingLedger, HarnessError> {
        let record = self
            .store
            .load_deployment(FUND_ME_NAME)?
            .ok_or(HarnessError::NotDeployed(FUND_ME_NAME))?;
        if record.network != self.network.name {
            return Err(HarnessError::NetworkMismatch {
                deployed: record.network,
                requested: self.network.name.clone(),
            });
        }
        let state = self
            .store
            .load_ledger_state()?
            .ok_or(HarnessError::NotDeployed(FUND_ME_NAME))?;
        let payout: Arc<AccountBook> = Arc::clone(&self.book);
        Ok(FundingLedger::from_state(state, self.oracle()?, payout)?)
    }

    fn save_book(&self) -> Result<(), HarnessError> {
        self.store.save_account_book(&self.book.export_state())?;
        self.store.flush()?;
        Ok(())
    }

    /// Persist the ledger and native balances, draining the ledger's events
    fn save(&self, ledger: &mut FundingLedger) -> Result<(), HarnessError> {
        for event in ledger.poll_events() {
            match event {
                LedgerEvent::Funded {
                    funder,
                    amount,
                    usd_value,
                } => debug!(%funder, amount, usd_value, "Funded"),
                LedgerEvent::Withdrawn {
                    owner,
                    amount,
                    funders_cleared,
                } => debug!(%owner, amount, funders_cleared, "Withdrawn"),
            }
        }
        self.store.save_ledger_state(&ledger.export_state())?;
        self.save_book()
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Deploy the mock feed (development networks) and the ledger
    ///
    /// On public networks `feed_endpoint` is stored and used for the live
    /// adapter; it is ignored on development networks.
    pub async fn deploy(&self, feed_endpoint: Option<&str>) -> Result<DeploySummary, HarnessError> {
        let owner = self.account(DEPLOYER)?;
        let nonce = self.store.load_deployer_nonce()?;
        let mut deployer = Deployer::new(self.network.clone(), owner)?.with_nonce(nonce);

        let live_feed: Option<Arc<dyn PriceOracle>> = match feed_endpoint {
            Some(endpoint) if !self.network.is_development() => {
                self.store.save_feed_endpoint(endpoint)?;
                let feed: Arc<dyn PriceOracle> = self.remote_feed()?;
                Some(feed)
            }
            _ => None,
        };

        if !self.network.is_development() {
            // No block-explorer client is bundled; verification is skipped
            warn!(network = %self.network.name, "No verification service configured");
        }

        let payout: Arc<AccountBook> = Arc::clone(&self.book);
        let mut deployment = deployer.deploy_all(live_feed, payout, None).await?;

        if let Some(feed) = deployer.mock_feed() {
            if let Some(record) = deployer.records().iter().find(|r| r.name == MOCK_FEED_NAME) {
                self.store.save_deployment(record)?;
            }
            self.store.save_mock_round(&feed.current_round())?;
        }
        self.store.save_deployment(&deployment.record)?;
        self.store.save_deployer_nonce(deployer.nonce())?;
        self.save(&mut deployment.ledger)?;

        Ok(DeploySummary {
            price_feed: deployment.ledger.price_feed(),
            record: deployment.record,
        })
    }

    /// Contribute `value` ether from a named account
    ///
    /// The amount is debited first and refunded if the ledger rejects it.
    pub async fn fund(&self, from: &str, value: &str) -> Result<ContributionReceipt, HarnessError> {
        let funder = self.account(from)?;
        let amount = parse_ether(value)?;
        let mut ledger = self.ledger()?;

        info!(funder = %funder, value, "Funding contract");
        self.book.debit(&funder, amount).map_err(HarnessError::Account)?;

        match ledger.contribute(&funder, amount).await {
            Ok(receipt) => {
                self.save(&mut ledger)?;
                Ok(receipt)
            }
            Err(e) => {
                self.book.credit(&funder, amount).map_err(HarnessError::Account)?;
                self.save_book()?;
                Err(e.into())
            }
        }
    }

    /// Withdraw everything to the owner, called from a named account
    pub async fn withdraw(&self, from: &str) -> Result<WithdrawalReceipt, HarnessError> {
        let caller = self.account(from)?;
        let mut ledger = self.ledger()?;

        info!(caller = %caller, "Withdrawing");
        let receipt = ledger.withdraw(&caller).await?;

        self.save(&mut ledger)?;
        Ok(receipt)
    }

    /// Current ledger state and price
    pub async fn status(&self) -> Result<LedgerStatus, HarnessError> {
        let ledger = self.ledger()?;
        let round = self.oracle()?.latest_round().await?;

        Ok(LedgerStatus {
            network: self.network.name.clone(),
            owner: *ledger.owner(),
            price_feed: ledger.price_feed(),
            price_usd: round.to_usd(WEI_PER_ETHER)?,
            minimum_usd: ledger.minimum_usd(),
            minimum_contribution: round.minimum_contribution(ledger.minimum_usd())?,
            held: ledger.held_total(),
            funders: ledger
                .funders()
                .iter()
                .map(|f| (*f, ledger.amount_funded(f)))
                .collect(),
            round,
        })
    }

    /// Publish a new answer on the mock feed
    pub fn set_price(&self, answer: i128) -> Result<RoundData, HarnessError> {
        if !self.network.is_development() {
            return Err(HarnessError::NotDevelopment(self.network.name.clone()));
        }
        let feed = self.mock_feed()?;
        feed.update_answer(answer);
        let round = feed.current_round();
        self.store.save_mock_round(&round)?;
        self.store.flush()?;
        info!(answer, round = round.round_id, "Mock feed updated");
        Ok(round)
    }
}
