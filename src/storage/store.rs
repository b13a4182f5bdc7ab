// FundMeStore - Persistent key-value storage using sled
//
// Provides typed access for storing:
// - Named account keypairs
// - Ledger state snapshots
// - Deployment records
// - The mock feed's current round
// - Native-currency account balances

use crate::deploy::DeploymentRecord;
use crate::identity::Keypair;
use crate::ledger::{AccountBookState, LedgerError, LedgerState};
use crate::oracle::RoundData;
use std::path::Path;
use thiserror::Error;

/// Key prefixes for organizing data
mod keys {
    pub const ACCOUNT_PREFIX: &[u8] = b"accounts:keypair:";
    pub const LEDGER_STATE: &[u8] = b"ledger:state";
    pub const DEPLOYMENT_PREFIX: &[u8] = b"deployments:";
    pub const DEPLOYER_NONCE: &[u8] = b"deployer:nonce";
    pub const MOCK_ROUND: &[u8] = b"oracle:mock_round";
    pub const ACCOUNT_BOOK: &[u8] = b"bank:balances";
    pub const FEED_ENDPOINT: &[u8] = b"oracle:endpoint";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Persistent key-value store for the harness
///
/// Uses sled for crash-safe, embedded storage.
/// All writes are atomic and durable after flush.
pub struct FundMeStore {
    db: sled::Db,
}

impl FundMeStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.is_empty())
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    // ========================================================================
    // RAW KEY-VALUE OPERATIONS
    // ========================================================================

    /// Put raw bytes
    pub fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    /// Get raw bytes
    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db.remove(key)?;
        Ok(())
    }

    /// List all keys with a given prefix
    pub fn list_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut keys = Vec::new();
        for result in self.db.scan_prefix(prefix) {
            let (key, _) = result?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn put_postcard<T: serde::Serialize>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(value)
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        self.put_raw(key, &bytes)
    }

    fn get_postcard<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(bytes) => postcard::from_bytes(&bytes)
                .map(Some)
                .map_err(|e| StoreError::DeserializationFailed(e.to_string())),
            None => Ok(None),
        }
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Save a keypair under a label
    pub fn save_keypair(&self, label: &str, keypair: &Keypair) -> Result<(), StoreError> {
        let key = [keys::ACCOUNT_PREFIX, label.as_bytes()].concat();
        self.put_raw(&key, &keypair.to_bytes())
    }

    /// Load a keypair by label
    pub fn load_keypair(&self, label: &str) -> Result<Option<Keypair>, StoreError> {
        let key = [keys::ACCOUNT_PREFIX, label.as_bytes()].concat();
        match self.get_raw(&key)? {
            Some(bytes) => {
                let keypair = Keypair::from_bytes(&bytes)
                    .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(keypair))
            }
            None => Ok(None),
        }
    }

    /// Labels of all stored accounts, sorted
    pub fn account_labels(&self) -> Result<Vec<String>, StoreError> {
        let mut labels: Vec<String> = self
            .list_keys_with_prefix(keys::ACCOUNT_PREFIX)?
            .into_iter()
            .map(|key| String::from_utf8_lossy(&key[keys::ACCOUNT_PREFIX.len()..]).into_owned())
            .collect();
        labels.sort();
        Ok(labels)
    }

    // ========================================================================
    // LEDGER STATE
    // ========================================================================

    /// Save the ledger snapshot
    pub fn save_ledger_state(&self, state: &LedgerState) -> Result<(), StoreError> {
        let bytes = state
            .to_bytes()
            .map_err(|e: LedgerError| StoreError::SerializationFailed(e.to_string()))?;
        self.put_raw(keys::LEDGER_STATE, &bytes)
    }

    /// Load the ledger snapshot
    pub fn load_ledger_state(&self) -> Result<Option<LedgerState>, StoreError> {
        match self.get_raw(keys::LEDGER_STATE)? {
            Some(bytes) => {
                let state = LedgerState::from_bytes(&bytes)
                    .map_err(|e: LedgerError| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // DEPLOYMENTS
    // ========================================================================

    /// Save a deployment record under its contract name
    pub fn save_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let key = [keys::DEPLOYMENT_PREFIX, record.name.as_bytes()].concat();
        self.put_raw(&key, &record.to_bytes())
    }

    /// Load the latest deployment of a contract by name
    pub fn load_deployment(&self, name: &str) -> Result<Option<DeploymentRecord>, StoreError> {
        let key = [keys::DEPLOYMENT_PREFIX, name.as_bytes()].concat();
        match self.get_raw(&key)? {
            Some(bytes) => {
                let record = DeploymentRecord::from_bytes(&bytes)
                    .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Save the deployer's next nonce
    pub fn save_deployer_nonce(&self, nonce: u64) -> Result<(), StoreError> {
        self.put_raw(keys::DEPLOYER_NONCE, &nonce.to_be_bytes())
    }

    /// Load the deployer's next nonce (zero if never saved)
    pub fn load_deployer_nonce(&self) -> Result<u64, StoreError> {
        match self.get_raw(keys::DEPLOYER_NONCE)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::DeserializationFailed("Invalid nonce length".to_string())
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    // ========================================================================
    // PRICE FEED AND ACCOUNT BOOK
    // ========================================================================

    /// Save the mock feed's current round
    pub fn save_mock_round(&self, round: &RoundData) -> Result<(), StoreError> {
        self.put_postcard(keys::MOCK_ROUND, round)
    }

    /// Load the mock feed's current round
    pub fn load_mock_round(&self) -> Result<Option<RoundData>, StoreError> {
        self.get_postcard(keys::MOCK_ROUND)
    }

    /// Save the endpoint of the live feed used on public networks
    pub fn save_feed_endpoint(&self, endpoint: &str) -> Result<(), StoreError> {
        self.put_raw(keys::FEED_ENDPOINT, endpoint.as_bytes())
    }

    /// Load the live feed endpoint
    pub fn load_feed_endpoint(&self) -> Result<Option<String>, StoreError> {
        match self.get_raw(keys::FEED_ENDPOINT)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::DeserializationFailed(e.to_string())),
            None => Ok(None),
        }
    }

    /// Save native-currency balances
    pub fn save_account_book(&self, state: &AccountBookState) -> Result<(), StoreError> {
        self.put_postcard(keys::ACCOUNT_BOOK, state)
    }

    /// Load native-currency balances
    pub fn load_account_book(&self) -> Result<Option<AccountBookState>, StoreError> {
        self.get_postcard(keys::ACCOUNT_BOOK)
    }
}
