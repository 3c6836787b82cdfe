// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use anchorstore::core::account::Account;
use anchorstore::core::errors::Error;
use anchorstore::core::keystore;

const SEED: &str = "d698bcd1a0930e2e0cfbca84643b1e1e55eca9e4d3204da745ca7a3e659c6e3d";

#[test]
fn seed_derivation_is_deterministic() {
    let a = Account::from_seed(SEED, 0).expect("account");
    let b = Account::from_seed(SEED, 0).expect("account");
    assert_eq!(a.public_key_string(), b.public_key_string());
    assert_eq!(a.public_key(), b.public_key());

    let c = Account::from_seed(SEED, 1).expect("account");
    assert_ne!(a.public_key_string(), c.public_key_string());
}

#[test]
fn public_key_string_roundtrip() {
    let full = Account::from_seed(SEED, 0).expect("account");
    let recovered =
        Account::from_public_key_string(&full.public_key_string()).expect("recover");
    assert!(!recovered.has_private_key());
    assert!(recovered.has_encryption_key());
    assert_eq!(recovered.public_key(), full.public_key());
    assert!(recovered.compare_public_key(&full));
}

#[test]
fn corrupted_key_strings_are_rejected() {
    let full = Account::from_seed(SEED, 0).expect("account");
    let good = full.public_key_string();

    let mut flipped = good.clone().into_bytes();
    let last = flipped.len() - 1;
    flipped[last] = if flipped[last] == b'1' { b'2' } else { b'1' };
    let flipped = String::from_utf8(flipped).expect("utf8");
    assert!(Account::from_public_key_string(&flipped).is_err());

    assert!(Account::from_public_key_string("missing_prefix").is_err());
    assert!(Account::from_public_key_string("anchor_!!!").is_err());
}

#[test]
fn sign_and_verify() {
    let signer = Account::from_seed(SEED, 0).expect("account");
    let message = b"message to sign";
    let signature = signer.sign(message).expect("sign");
    assert!(signer.verify(message, &signature));
    assert!(!signer.verify(b"another message", &signature));
    assert!(!signer.verify(message, &signature[..63]));

    let public = Account::from_public_key_string(&signer.public_key_string()).expect("recover");
    assert!(public.verify(message, &signature));
    assert!(matches!(public.sign(message), Err(Error::PrivateKeyRequired)));
}

#[test]
fn asymmetric_encryption_roundtrip() {
    let recipient = Account::from_seed(SEED, 0).expect("account");
    let stranger = Account::from_seed(SEED, 1).expect("account");

    let sealed = recipient.encrypt_to(b"wrapped key material").expect("encrypt");
    assert_eq!(recipient.decrypt(&sealed).expect("decrypt"), b"wrapped key material");

    // Encryption is randomized.
    let again = recipient.encrypt_to(b"wrapped key material").expect("encrypt");
    assert_ne!(sealed, again);

    assert!(matches!(
        stranger.decrypt(&sealed),
        Err(Error::DecryptionFailed)
    ));

    let public = Account::from_public_key_string(&recipient.public_key_string()).expect("recover");
    // Public accounts can seal but not open.
    public.encrypt_to(b"ok").expect("encrypt");
    assert!(matches!(public.decrypt(&sealed), Err(Error::PrivateKeyRequired)));
}

#[test]
fn verify_only_accounts_cannot_be_encrypted_to() {
    let full = Account::from_seed(SEED, 0).expect("account");
    let verify_only =
        Account::from_signing_public_key(&full.public_key()[..32]).expect("verify-only");
    assert!(!verify_only.has_encryption_key());
    assert!(matches!(
        verify_only.encrypt_to(b"x"),
        Err(Error::NoEncryption)
    ));
}

#[test]
fn keystore_persists_the_anchor_account() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dir_str = dir.path().to_str().expect("utf8 path");

    let first = keystore::load_or_create(dir_str).expect("create");
    let second = keystore::load_or_create(dir_str).expect("reload");
    assert_eq!(first.public_key_string(), second.public_key_string());
    assert!(first.has_private_key());

    let key_file = dir.path().join("anchor.key");
    assert!(key_file.exists());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&key_file).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn wire_errors_roundtrip_with_stable_codes() {
    let cases = vec![
        Error::InvalidPath("bad".into()),
        Error::InvalidTag("bad".into()),
        Error::AccountRequired,
        Error::SignatureExpired,
        Error::AccessDenied("outside namespace".into()),
        Error::DocumentNotFound,
        Error::QuotaExceeded("over".into()),
        Error::ValidationFailed("nope".into()),
        Error::AnchorPrincipalRequired,
        Error::NoMatchingKey,
        Error::CannotRevokeLast,
        Error::MalformedContainer("truncated".into()),
    ];
    for error in cases {
        let wire = error.to_wire();
        assert!(!wire.ok);
        assert_eq!(wire.status_code, Some(error.http_status()));

        let json = serde_json::to_string(&wire).expect("serialize");
        let parsed: anchorstore::core::errors::WireError =
            serde_json::from_str(&json).expect("deserialize");
        let recovered = Error::from_wire(&parsed);
        assert_eq!(recovered.code(), error.code());
        assert_eq!(recovered.http_status(), error.http_status());
    }
}

#[test]
fn internal_details_never_reach_the_wire() {
    let error = Error::Internal("sled tree corrupted at offset 12345".into());
    let wire = error.to_wire();
    assert_eq!(wire.error, "internal error");
    assert_eq!(wire.status_code, Some(500));
}
