// Funding Ledger - contributions gated by a USD minimum, drained by the owner
//
// Mutating operations take `&mut self`, so calls on one ledger never
// interleave. Each operation awaits its external collaborator (oracle read
// or payout transfer) before touching any field; the mutation that follows
// runs to completion without another await, so a dropped or failed call
// leaves no partial effects.

use crate::identity::Address;
use crate::ledger::payout::PayoutTarget;
use crate::oracle::{OracleError, PriceOracle};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default admission threshold: 50 USD with 18 decimals
pub const MINIMUM_USD: u128 = 50 * 1_000_000_000_000_000_000;

// ============================================================================
// LEDGER ERROR
// ============================================================================

/// Errors that can occur during ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient contribution: worth {usd_value} USD-wei, minimum is {minimum_usd}")]
    InsufficientContribution { usd_value: u128, minimum_usd: u128 },

    #[error("Unauthorized: {caller} is not the owner")]
    Unauthorized { caller: Address },

    #[error("Funder index {index} out of range (funder count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Transfer to owner failed: {0}")]
    TransferFailure(String),

    #[error("Price oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Balance would overflow")]
    BalanceOverflow,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State export/import error: {0}")]
    StateError(String),
}

// ============================================================================
// LEDGER CONFIG
// ============================================================================

/// Construction-time parameters of a ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Admission threshold in USD with 18 decimals
    pub minimum_usd: u128,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            minimum_usd: MINIMUM_USD,
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minimum_usd(mut self, minimum_usd: u128) -> Self {
        self.minimum_usd = minimum_usd;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.minimum_usd == 0 {
            return Err(LedgerError::InvalidConfig(
                "minimum_usd must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RECEIPTS AND EVENTS
// ============================================================================

/// Outcome of an accepted contribution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContributionReceipt {
    pub funder: Address,
    pub amount: u128,
    /// USD value of `amount` at the round used for admission
    pub usd_value: u128,
    /// Funder's accumulated balance after this contribution
    pub balance: u128,
    pub round_id: u64,
    /// True if this contribution added the funder to the list
    pub new_funder: bool,
}

/// Outcome of a successful withdrawal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    pub owner: Address,
    pub amount: u128,
    pub funders_cleared: usize,
    pub transfer_id: String,
}

/// Events emitted by the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Funded {
        funder: Address,
        amount: u128,
        usd_value: u128,
    },
    Withdrawn {
        owner: Address,
        amount: u128,
        funders_cleared: usize,
    },
}

// ============================================================================
// LEDGER STATE
// ============================================================================

/// Serializable snapshot of a ledger (collaborators excluded)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub owner: Address,
    pub price_feed: Address,
    pub minimum_usd: u128,
    pub funders: Vec<Address>,
    pub balances: Vec<(Address, u128)>,
    pub held: u128,
}

impl LedgerState {
    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        postcard::to_allocvec(self).map_err(|e| LedgerError::StateError(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        postcard::from_bytes(bytes).map_err(|e| LedgerError::StateError(e.to_string()))
    }
}

// ============================================================================
// FUNDING LEDGER
// ============================================================================

/// The crowdfunding ledger
pub struct FundingLedger {
    owner: Address,
    oracle: Arc<dyn PriceOracle>,
    payout: Arc<dyn PayoutTarget>,
    minimum_usd: u128,
    funders: Vec<Address>,
    balances: HashMap<Address, u128>,
    held: u128,
    events: Vec<LedgerEvent>,
}

impl std::fmt::Debug for FundingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundingLedger")
            .field("owner", &self.owner)
            .field("price_feed", &self.price_feed())
            .field("minimum_usd", &self.minimum_usd)
            .field("funders", &self.funders)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl FundingLedger {
    /// Create an empty ledger with the default threshold
    pub fn new(owner: Address, oracle: Arc<dyn PriceOracle>, payout: Arc<dyn PayoutTarget>) -> Self {
        Self {
            owner,
            oracle,
            payout,
            minimum_usd: MINIMUM_USD,
            funders: Vec::new(),
            balances: HashMap::new(),
            held: 0,
            events: Vec::new(),
        }
    }

    /// Create an empty ledger with a custom configuration
    pub fn with_config(
        config: LedgerConfig,
        owner: Address,
        oracle: Arc<dyn PriceOracle>,
        payout: Arc<dyn PayoutTarget>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let mut ledger = Self::new(owner, oracle, payout);
        ledger.minimum_usd = config.minimum_usd;
        Ok(ledger)
    }

    // ========================================================================
    // READ ACCESSORS
    // ========================================================================

    /// Address of the price feed this ledger consults
    pub fn price_feed(&self) -> Address {
        self.oracle.address()
    }

    /// The only identity allowed to withdraw
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Admission threshold in USD with 18 decimals
    pub fn minimum_usd(&self) -> u128 {
        self.minimum_usd
    }

    /// Accumulated contribution of an identity (zero if absent)
    pub fn amount_funded(&self, funder: &Address) -> u128 {
        self.balances.get(funder).copied().unwrap_or(0)
    }

    /// Funder at a position in contribution order
    pub fn funder(&self, index: usize) -> Result<&Address, LedgerError> {
        self.funders.get(index).ok_or(LedgerError::IndexOutOfRange {
            index,
            len: self.funders.len(),
        })
    }

    /// All funders in contribution order
    pub fn funders(&self) -> &[Address] {
        &self.funders
    }

    pub fn funder_count(&self) -> usize {
        self.funders.len()
    }

    /// Total native currency held by the ledger
    pub fn held_total(&self) -> u128 {
        self.held
    }

    /// True when no funds are held and no funders are recorded
    pub fn is_empty(&self) -> bool {
        self.funders.is_empty() && self.held == 0
    }

    // ========================================================================
    // CONTRIBUTE
    // ========================================================================

    /// Accept `amount` wei from `caller` if it is worth at least the minimum
    pub async fn contribute(&mut self, caller: &Address, amount: u128) -> Result<ContributionReceipt, LedgerError> {
        let round = self.oracle.latest_round().await?;
        let usd_value = round.to_usd(amount)?;

        if usd_value < self.minimum_usd {
            debug!(
                funder = %caller,
                amount,
                usd_value,
                minimum_usd = self.minimum_usd,
                "Rejected contribution below minimum"
            );
            return Err(LedgerError::InsufficientContribution {
                usd_value,
                minimum_usd: self.minimum_usd,
            });
        }

        let current = self.balances.get(caller).copied();
        let balance = current
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        let held = self
            .held
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        // All checks passed; commit
        let new_funder = current.is_none();
        if new_funder {
            self.funders.push(*caller);
        }
        self.balances.insert(*caller, balance);
        self.held = held;

        self.events.push(LedgerEvent::Funded {
            funder: *caller,
            amount,
            usd_value,
        });

        info!(funder = %caller, amount, usd_value, balance, held, "Contribution accepted");

        Ok(ContributionReceipt {
            funder: *caller,
            amount,
            usd_value,
            balance,
            round_id: round.round_id,
            new_funder,
        })
    }

    // ========================================================================
    // WITHDRAW
    // ========================================================================

    /// Send everything held to the owner and reset the ledger
    pub async fn withdraw(&mut self, caller: &Address) -> Result<WithdrawalReceipt, LedgerError> {
        if caller != &self.owner {
            warn!(caller = %caller, owner = %self.owner, "Rejected withdrawal by non-owner");
            return Err(LedgerError::Unauthorized { caller: *caller });
        }

        let amount = self.held;
        let transfer_id = self
            .payout
            .transfer(&self.owner, amount)
            .await
            .map_err(|reason| {
                warn!(owner = %self.owner, amount, %reason, "Withdrawal transfer failed");
                LedgerError::TransferFailure(reason)
            })?;

        // Transfer confirmed; reset
        let funders_cleared = self.funders.len();
        for funder in self.funders.drain(..) {
            self.balances.remove(&funder);
        }
        self.held = 0;

        self.events.push(LedgerEvent::Withdrawn {
            owner: self.owner,
            amount,
            funders_cleared,
        });

        info!(owner = %self.owner, amount, funders_cleared, %transfer_id, "Withdrawal complete");

        Ok(WithdrawalReceipt {
            owner: self.owner,
            amount,
            funders_cleared,
            transfer_id,
        })
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    /// Poll for events (clears the event queue)
    ///
    /// Events accumulate until polled; long-lived owners of a ledger must
    /// drain them.
    pub fn poll_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // STATE EXPORT/IMPORT
    // ========================================================================

    /// Export ledger state for persistence
    pub fn export_state(&self) -> LedgerState {
        let balances: Vec<(Address, u128)> = self
            .funders
            .iter()
            .map(|funder| (*funder, self.amount_funded(funder)))
            .collect();

        LedgerState {
            owner: self.owner,
            price_feed: self.price_feed(),
            minimum_usd: self.minimum_usd,
            funders: self.funders.clone(),
            balances,
            held: self.held,
        }
    }

    /// Rebuild a ledger from a snapshot, wiring in its collaborators
    pub fn from_state(
        state: LedgerState,
        oracle: Arc<dyn PriceOracle>,
        payout: Arc<dyn PayoutTarget>,
    ) -> Result<Self, LedgerError> {
        if oracle.address() != state.price_feed {
            return Err(LedgerError::StateError(format!(
                "price feed mismatch: snapshot uses {}, oracle is {}",
                state.price_feed,
                oracle.address()
            )));
        }

        let funder_set: HashSet<Address> = state.funders.iter().copied().collect();
        if funder_set.len() != state.funders.len() {
            return Err(LedgerError::StateError(
                "funder list contains duplicates".to_string(),
            ));
        }

        let entries = state.balances.len();
        let balances: HashMap<Address, u128> = state.balances.into_iter().collect();
        if balances.len() != entries {
            return Err(LedgerError::StateError(
                "balance entries contain duplicates".to_string(),
            ));
        }

        // Balance keys and funders must be the same set, every balance positive
        if balances.len() != funder_set.len()
            || balances
                .iter()
                .any(|(funder, amount)| *amount == 0 || !funder_set.contains(funder))
        {
            return Err(LedgerError::StateError(
                "funder list and balances disagree".to_string(),
            ));
        }

        let mut total: u128 = 0;
        for amount in balances.values() {
            total = total
                .checked_add(*amount)
                .ok_or(LedgerError::BalanceOverflow)?;
        }
        if total != state.held {
            return Err(LedgerError::StateError(format!(
                "balances sum to {} but held total is {}",
                total, state.held
            )));
        }

        let config = LedgerConfig::new().with_minimum_usd(state.minimum_usd);
        let mut ledger = Self::with_config(config, state.owner, oracle, payout)?;
        ledger.funders = state.funders;
        ledger.balances = balances;
        ledger.held = state.held;
        Ok(ledger)
    }
}
