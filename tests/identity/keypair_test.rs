use fundme::identity::{Keypair, KeypairError};

/// Test: Each generated keypair should be unique
#[test]
fn test_keypairs_are_unique() {
    let keypair1 = Keypair::generate();
    let keypair2 = Keypair::generate();

    assert_ne!(
        keypair1.public_key_bytes(),
        keypair2.public_key_bytes(),
        "Two generated keypairs should have different public keys"
    );
    assert_ne!(keypair1.address(), keypair2.address());
}

/// Test: Can serialize keypair to bytes and restore it
#[test]
fn test_keypair_roundtrip() {
    let keypair = Keypair::generate();
    let bytes = keypair.to_bytes();

    let restored = Keypair::from_bytes(&bytes).expect("Should restore keypair from bytes");

    assert_eq!(restored.public_key_bytes(), keypair.public_key_bytes());
    assert_eq!(restored.address(), keypair.address());
}

/// Test: Address is derived from the public key, not the secret
#[test]
fn test_address_is_stable() {
    let keypair = Keypair::generate();

    assert_eq!(keypair.address(), keypair.address());
    assert!(!keypair.address().is_zero());
}

/// Test: Wrong-length key material is rejected
#[test]
fn test_invalid_key_length() {
    let result = Keypair::from_bytes(&[1u8; 16]);

    assert!(matches!(
        result,
        Err(KeypairError::InvalidLength {
            expected: 32,
            got: 16
        })
    ));
}

/// Test: Debug output never includes the secret key
#[test]
fn test_debug_hides_secret() {
    let keypair = Keypair::generate();
    let debug = format!("{:?}", keypair);
    let secret_hex: String = keypair.to_bytes().iter().map(|b| format!("{:02x}", b)).collect();

    assert!(debug.contains("Keypair"));
    assert!(!debug.contains(&secret_hex));
}
