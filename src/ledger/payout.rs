// Payout targets - where withdrawn funds are sent
// A withdrawal only resets the ledger after its target confirms the transfer

use crate::identity::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// PAYOUT TARGET TRAIT
// ============================================================================

/// Receiver of outbound transfers from the ledger
#[async_trait]
pub trait PayoutTarget: Send + Sync {
    /// Move `amount` wei to `to`
    /// Returns a transfer ID on success, error message on failure
    async fn transfer(&self, to: &Address, amount: u128) -> Result<String, String>;
}

// ============================================================================
// ACCOUNT BOOK
// ============================================================================

/// Snapshot of an AccountBook for persistence
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBookState {
    pub balances: Vec<(Address, u128)>,
    pub transfers: u64,
}

/// In-memory native-currency balances, the local stand-in for a chain
pub struct AccountBook {
    balances: Mutex<HashMap<Address, u128>>,
    transfers: AtomicUsize,
}

impl AccountBook {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            transfers: AtomicUsize::new(0),
        }
    }

    /// Rebuild a book from a snapshot
    pub fn from_state(state: AccountBookState) -> Self {
        Self {
            balances: Mutex::new(state.balances.into_iter().collect()),
            transfers: AtomicUsize::new(state.transfers as usize),
        }
    }

    /// Capture the current balances
    pub fn export_state(&self) -> AccountBookState {
        let mut balances: Vec<(Address, u128)> = self
            .lock()
            .iter()
            .map(|(addr, amount)| (*addr, *amount))
            .collect();
        balances.sort();
        AccountBookState {
            balances,
            transfers: self.transfers.load(Ordering::SeqCst) as u64,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Address, u128>> {
        self.balances.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Balance of an account (zero if unknown)
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.lock().get(account).copied().unwrap_or(0)
    }

    /// Add funds to an account
    pub fn credit(&self, account: &Address, amount: u128) -> Result<u128, String> {
        let mut balances = self.lock();
        let entry = balances.entry(*account).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| format!("balance of {} would overflow", account))?;
        Ok(*entry)
    }

    /// Remove funds from an account
    pub fn debit(&self, account: &Address, amount: u128) -> Result<u128, String> {
        let mut balances = self.lock();
        let available = balances.get(account).copied().unwrap_or(0);
        if available < amount {
            return Err(format!(
                "insufficient funds in {}: available {}, required {}",
                account, available, amount
            ));
        }
        let remaining = available - amount;
        balances.insert(*account, remaining);
        Ok(remaining)
    }

    /// Number of known accounts
    pub fn account_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for AccountBook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutTarget for AccountBook {
    async fn transfer(&self, to: &Address, amount: u128) -> Result<String, String> {
        self.credit(to, amount)?;
        let n = self.transfers.fetch_add(1, Ordering::SeqCst);
        Ok(format!("transfer-{}", n))
    }
}

// ============================================================================
// MOCK PAYOUT TARGET
// ============================================================================

/// Mock implementation of PayoutTarget for testing
pub struct MockPayoutTarget {
    should_succeed: bool,
    failure_message: Option<String>,
    failures_before_success: usize,
    call_count: AtomicUsize,
    delivered: Mutex<Vec<(Address, u128)>>,
}

impl MockPayoutTarget {
    /// Create a new mock target (defaults to success)
    pub fn new() -> Self {
        Self {
            should_succeed: true,
            failure_message: None,
            failures_before_success: 0,
            call_count: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Configure to always fail with a message
    pub fn with_failure(mut self, message: &str) -> Self {
        self.should_succeed = false;
        self.failure_message = Some(message.to_string());
        self
    }

    /// Fail N times, then succeed
    pub fn with_failures_then_success(mut self, failures: usize) -> Self {
        self.should_succeed = true;
        self.failures_before_success = failures;
        self
    }

    /// Number of transfer attempts
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Transfers that succeeded, in order
    pub fn delivered(&self) -> Vec<(Address, u128)> {
        self.delivered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn failure(&self) -> String {
        self.failure_message
            .clone()
            .unwrap_or_else(|| "Mock failure".to_string())
    }
}

impl Default for MockPayoutTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutTarget for MockPayoutTarget {
    async fn transfer(&self, to: &Address, amount: u128) -> Result<String, String> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);

        if call_num < self.failures_before_success || !self.should_succeed {
            return Err(self.failure());
        }

        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((*to, amount));
        Ok(format!("tx-mock-{}", call_num))
    }
}
