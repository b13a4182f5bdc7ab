// Contract verification against a block-explorer service
// "Already verified" counts as success so re-running a deploy is harmless

use crate::identity::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

/// What gets submitted for verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub address: Address,
    pub constructor_arguments: Vec<String>,
}

/// Result of a verification attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified { reference: String },
    AlreadyVerified,
    Failed(String),
}

impl VerificationOutcome {
    /// Verified now or previously
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Block-explorer verification backend
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Submit source metadata; returns a reference on success, message on failure
    async fn submit(&self, request: &VerificationRequest) -> Result<String, String>;
}

/// Verify a deployed contract, treating "already verified" as success
pub async fn verify(
    service: &dyn VerificationService,
    address: Address,
    constructor_arguments: Vec<String>,
) -> VerificationOutcome {
    info!(%address, "Verifying contract");

    let request = VerificationRequest {
        address,
        constructor_arguments,
    };

    match service.submit(&request).await {
        Ok(reference) => {
            info!(%address, %reference, "Contract verified");
            VerificationOutcome::Verified { reference }
        }
        Err(message) if message.to_lowercase().contains("already verified") => {
            info!(%address, "Already verified");
            VerificationOutcome::AlreadyVerified
        }
        Err(message) => {
            warn!(%address, error = %message, "Verification failed");
            VerificationOutcome::Failed(message)
        }
    }
}

// ============================================================================
// MOCK VERIFICATION SERVICE
// ============================================================================

/// Mock implementation of VerificationService for testing
pub struct MockVerificationService {
    response: Result<String, String>,
    requests: Mutex<Vec<VerificationRequest>>,
    call_count: AtomicUsize,
}

impl MockVerificationService {
    /// Create a mock that accepts every submission
    pub fn new() -> Self {
        Self {
            response: Ok("guid-mock".to_string()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Configure to fail with a message
    pub fn with_failure(mut self, message: &str) -> Self {
        self.response = Err(message.to_string());
        self
    }

    /// Configure to report the contract as already verified
    pub fn already_verified() -> Self {
        Self::new().with_failure("Contract source code already verified")
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockVerificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerificationService for MockVerificationService {
    async fn submit(&self, request: &VerificationRequest) -> Result<String, String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.response.clone()
    }
}
