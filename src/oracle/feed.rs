// Price feed trait and round data
// Defines the PriceOracle capability and the fixed-point USD conversion

use crate::identity::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal scale of USD values and of one unit of native currency
pub const USD_DECIMALS: u32 = 18;

/// Largest feed precision whose scale factor fits in a u128
pub const MAX_FEED_DECIMALS: u8 = 38;

/// Feed answers with more decimals than this are truncated before conversion
pub const PRICE_PRECISION: u8 = 8;

// ============================================================================
// ORACLE ERROR
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Oracle answer must be positive, got {0}")]
    InvalidAnswer(i128),

    #[error("Unsupported feed precision: {0} decimals")]
    UnsupportedDecimals(u8),

    #[error("USD conversion overflowed")]
    ConversionOverflow,

    #[error("Oracle answer is stale: updated {age_secs}s ago, limit {max_age_secs}s")]
    StaleAnswer { age_secs: u64, max_age_secs: u64 },

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle request timed out")]
    Timeout,

    #[error("Malformed oracle response: {0}")]
    Protocol(String),

    #[error("Invalid oracle configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// ROUND DATA
// ============================================================================

/// One answer from a price feed: the USD price of one unit of native currency
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u64,
    /// Price scaled by `10^decimals`
    pub answer: i128,
    pub decimals: u8,
    pub started_at: i64,
    pub updated_at: i64,
}

impl RoundData {
    /// Create round data stamped with the current time
    pub fn new(round_id: u64, answer: i128, decimals: u8) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            round_id,
            answer,
            decimals,
            started_at: now,
            updated_at: now,
        }
    }

    /// The answer as an unsigned price, rejecting non-positive values
    pub fn price(&self) -> Result<u128, OracleError> {
        if self.answer <= 0 {
            return Err(OracleError::InvalidAnswer(self.answer));
        }
        Ok(self.answer as u128)
    }

    /// Price and its scale factor, with precision capped at PRICE_PRECISION
    /// decimals so that the product with a native amount stays in range
    fn normalized(&self) -> Result<(u128, u128), OracleError> {
        let price = self.price()?;
        if self.decimals > MAX_FEED_DECIMALS {
            return Err(OracleError::UnsupportedDecimals(self.decimals));
        }
        if self.decimals <= PRICE_PRECISION {
            return Ok((price, 10u128.pow(self.decimals as u32)));
        }

        let excess = (self.decimals - PRICE_PRECISION) as u32;
        let truncated = price / 10u128.pow(excess);
        if truncated == 0 {
            return Err(OracleError::InvalidAnswer(self.answer));
        }
        Ok((truncated, 10u128.pow(PRICE_PRECISION as u32)))
    }

    /// Convert a native amount (wei) to USD with 18 decimals
    ///
    /// `price * amount / 10^decimals`, rounded down. This equals scaling the
    /// price to 18 decimals first and dividing by 10^18, without the
    /// intermediate overflow.
    pub fn to_usd(&self, amount: u128) -> Result<u128, OracleError> {
        let (price, scale) = self.normalized()?;
        let product = price
            .checked_mul(amount)
            .ok_or(OracleError::ConversionOverflow)?;
        Ok(product / scale)
    }

    /// Smallest native amount whose USD value reaches `minimum_usd`
    pub fn minimum_contribution(&self, minimum_usd: u128) -> Result<u128, OracleError> {
        let (price, scale) = self.normalized()?;
        let numerator = minimum_usd
            .checked_mul(scale)
            .ok_or(OracleError::ConversionOverflow)?;
        Ok(numerator.div_ceil(price))
    }

    /// Seconds since this round was last updated
    pub fn age_secs(&self, now: i64) -> u64 {
        now.saturating_sub(self.updated_at).max(0) as u64
    }
}

// ============================================================================
// PRICE ORACLE TRAIT
// ============================================================================

/// Source of the current native/USD exchange rate
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Address identifying this feed
    fn address(&self) -> Address;

    /// Read the most recent round. Never cached by callers.
    async fn latest_round(&self) -> Result<RoundData, OracleError>;

    /// Precision of the feed's answers
    async fn decimals(&self) -> Result<u8, OracleError> {
        Ok(self.latest_round().await?.decimals)
    }
}
