// Harness module - THE LOCAL ENVIRONMENT
// Named accounts, native balances, deployments and the ledger snapshot,
// persisted in one store and driven by the CLI

mod session;

pub use session::{
    AccountSummary, DeploySummary, Harness, HarnessError, LedgerStatus, DEPLOYER,
    INITIAL_ACCOUNT_BALANCE, USER,
};
