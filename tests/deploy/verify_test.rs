// Source verification tests

use fundme::deploy::{verify, MockVerificationService, VerificationOutcome, VerificationService};
use fundme::identity::Address;

#[tokio::test]
async fn test_successful_verification() {
    let service = MockVerificationService::new();
    let address = Address::random();

    let outcome = verify(&service, address, vec!["0xfeed".to_string()]).await;

    assert!(matches!(outcome, VerificationOutcome::Verified { .. }));
    assert!(outcome.is_success());
    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].address, address);
    assert_eq!(requests[0].constructor_arguments, vec!["0xfeed".to_string()]);
}

#[tokio::test]
async fn test_already_verified_counts_as_success() {
    let service = MockVerificationService::already_verified();

    let outcome = verify(&service, Address::random(), Vec::new()).await;

    assert_eq!(outcome, VerificationOutcome::AlreadyVerified);
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_already_verified_match_ignores_case() {
    let service = MockVerificationService::new().with_failure("ALREADY VERIFIED");
    let outcome = verify(&service, Address::random(), Vec::new()).await;
    assert_eq!(outcome, VerificationOutcome::AlreadyVerified);
}

#[tokio::test]
async fn test_failure_is_reported_not_raised() {
    let service = MockVerificationService::new().with_failure("rate limited");

    let outcome = verify(&service, Address::random(), Vec::new()).await;

    assert_eq!(outcome, VerificationOutcome::Failed("rate limited".to_string()));
    assert!(!outcome.is_success());
    assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn test_mock_records_submissions() {
    let service = MockVerificationService::default();
    let first = Address::random();
    let second = Address::random();

    service
        .submit(&fundme::deploy::VerificationRequest {
            address: first,
            constructor_arguments: Vec::new(),
        })
        .await
        .unwrap();
    verify(&service, second, Vec::new()).await;

    let addresses: Vec<Address> = service.requests().iter().map(|r| r.address).collect();
    assert_eq!(addresses, vec![first, second]);
}
