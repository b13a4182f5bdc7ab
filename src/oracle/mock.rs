// Mock price feed - fixed, deterministic answers for development networks

use crate::identity::Address;
use crate::oracle::{OracleError, PriceOracle, RoundData};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Default precision of the mock feed
pub const DECIMALS: u8 = 8;

/// Default answer of the mock feed: 2000 USD with 8 decimals
pub const INITIAL_ANSWER: i128 = 2000_0000_0000;

/// Mock aggregator returning whatever answer it was last given
pub struct MockPriceFeed {
    address: Address,
    round: Mutex<RoundData>,
    read_count: AtomicUsize,
}

impl MockPriceFeed {
    /// Create a feed at `address` with the given precision and first answer
    pub fn new(address: Address, decimals: u8, initial_answer: i128) -> Self {
        Self {
            address,
            round: Mutex::new(RoundData::new(1, initial_answer, decimals)),
            read_count: AtomicUsize::new(0),
        }
    }

    /// Create a feed with the development defaults
    pub fn with_defaults(address: Address) -> Self {
        Self::new(address, DECIMALS, INITIAL_ANSWER)
    }

    /// Restore a feed from a previously stored round
    pub fn from_round(address: Address, round: RoundData) -> Self {
        Self {
            address,
            round: Mutex::new(round),
            read_count: AtomicUsize::new(0),
        }
    }

    /// Publish a new answer, starting a new round
    pub fn update_answer(&self, answer: i128) {
        let mut round = self.round.lock().unwrap_or_else(|e| e.into_inner());
        let next = RoundData::new(round.round_id + 1, answer, round.decimals);
        *round = next;
    }

    /// Current round without counting it as a read
    pub fn current_round(&self) -> RoundData {
        self.round.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Precision of the feed
    pub fn decimals(&self) -> u8 {
        self.current_round().decimals
    }

    /// Number of `latest_round` calls served
    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for MockPriceFeed {
    fn address(&self) -> Address {
        self.address
    }

    async fn latest_round(&self) -> Result<RoundData, OracleError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_round())
    }

    async fn decimals(&self) -> Result<u8, OracleError> {
        Ok(self.current_round().decimals)
    }
}
