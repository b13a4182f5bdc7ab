// Ledger module - THE ACCOUNTING
// Contributions, per-funder balances and the owner-only withdrawal

mod fund_me;
mod payout;
pub mod units;

pub use fund_me::{
    ContributionReceipt, FundingLedger, LedgerConfig, LedgerError, LedgerEvent, LedgerState,
    WithdrawalReceipt, MINIMUM_USD,
};
pub use payout::{AccountBook, AccountBookState, MockPayoutTarget, PayoutTarget};
pub use units::{format_ether, format_usd, parse_ether, UnitsError, WEI_PER_ETHER};
