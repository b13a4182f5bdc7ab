// Deploy module - BOOTSTRAP
// Network configuration, deployment of the feed and ledger, and verification

mod deployer;
mod network;
mod verify;

pub use deployer::{
    DeployError, Deployer, Deployment, DeploymentRecord, FUND_ME_NAME, MOCK_FEED_NAME,
};
pub use network::{NetworkConfig, NetworkError, NetworkRegistry, DEVELOPMENT_CHAINS, LOCAL_CHAIN_ID};
pub use verify::{
    verify, MockVerificationService, VerificationOutcome, VerificationRequest,
    VerificationService,
};
