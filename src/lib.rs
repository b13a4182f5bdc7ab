//! FundMe: a crowdfunding ledger with an oracle-gated USD minimum and an
//! owner-only withdrawal, plus the harness around it (mock and live price
//! feeds, deployment, verification and persistence).

pub mod deploy;
pub mod harness;
pub mod identity;
pub mod ledger;
pub mod oracle;
pub mod storage;
