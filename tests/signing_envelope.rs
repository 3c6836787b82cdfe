// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use chrono::{Duration, Utc};

use anchorstore::core::account::Account;
use anchorstore::core::signing::{
    sign_data, verify_signed_data, SignableValue, VerifyOptions, DEFAULT_MAX_SKEW_MS,
};

const SEED: &str = "d698bcd1a0930e2e0cfbca84643b1e1e55eca9e4d3204da745ca7a3e659c6e3d";

fn signer() -> Account {
    Account::from_seed(SEED, 0).expect("account from seed")
}

fn sample_signable() -> Vec<SignableValue> {
    vec![
        SignableValue::from("PUT"),
        SignableValue::from("/user/someone/docs/a.txt"),
        SignableValue::Int(42),
        SignableValue::Bool(true),
        SignableValue::Bytes(vec![1, 2, 3]),
    ]
}

#[test]
fn sign_then_verify_roundtrip() {
    let signer = signer();
    let signable = sample_signable();
    let field = sign_data(&signer, &signable).expect("sign");
    assert!(verify_signed_data(
        &signer,
        &signable,
        &field,
        &VerifyOptions::default()
    ));
}

#[test]
fn tampering_with_any_element_fails() {
    let signer = signer();
    let signable = sample_signable();
    let field = sign_data(&signer, &signable).expect("sign");

    for index in 0..signable.len() {
        let mut tampered = signable.clone();
        tampered[index] = match &tampered[index] {
            SignableValue::Str(s) => SignableValue::Str(format!("{s}x")),
            SignableValue::Int(v) => SignableValue::Int(v + 1),
            SignableValue::Bytes(b) => {
                let mut b = b.clone();
                b.push(0);
                SignableValue::Bytes(b)
            }
            SignableValue::Bool(b) => SignableValue::Bool(!b),
        };
        assert!(
            !verify_signed_data(&signer, &tampered, &field, &VerifyOptions::default()),
            "element {index} tamper went unnoticed"
        );
    }
}

#[test]
fn tampering_with_envelope_fields_fails() {
    let signer = signer();
    let signable = sample_signable();
    let field = sign_data(&signer, &signable).expect("sign");

    let mut bad_nonce = field.clone();
    bad_nonce.nonce.push('x');
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &bad_nonce,
        &VerifyOptions::default()
    ));

    let mut bad_timestamp = field.clone();
    bad_timestamp.timestamp = (Utc::now() + Duration::seconds(1))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &bad_timestamp,
        &VerifyOptions::default()
    ));

    let mut bad_signature = field.clone();
    bad_signature.signature = format!("x{}", bad_signature.signature);
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &bad_signature,
        &VerifyOptions::default()
    ));
}

#[test]
fn wrong_verifier_fails() {
    let signer = signer();
    let other = Account::from_seed(SEED, 1).expect("account from seed");
    let signable = sample_signable();
    let field = sign_data(&signer, &signable).expect("sign");
    assert!(!verify_signed_data(
        &other,
        &signable,
        &field,
        &VerifyOptions::default()
    ));
}

#[test]
fn skewed_timestamps_are_rejected() {
    let signer = signer();
    let signable = sample_signable();
    let field = sign_data(&signer, &signable).expect("sign");

    // Just inside the default skew window.
    let near = VerifyOptions {
        now: Some(Utc::now() + Duration::milliseconds(DEFAULT_MAX_SKEW_MS - 5_000)),
        ..VerifyOptions::default()
    };
    assert!(verify_signed_data(&signer, &signable, &field, &near));

    // Beyond it, in both directions.
    let late = VerifyOptions {
        now: Some(Utc::now() + Duration::milliseconds(DEFAULT_MAX_SKEW_MS + 5_000)),
        ..VerifyOptions::default()
    };
    assert!(!verify_signed_data(&signer, &signable, &field, &late));

    let early = VerifyOptions {
        now: Some(Utc::now() - Duration::milliseconds(DEFAULT_MAX_SKEW_MS + 5_000)),
        ..VerifyOptions::default()
    };
    assert!(!verify_signed_data(&signer, &signable, &field, &early));
}

#[test]
fn structural_faults_verify_false_without_panicking() {
    let signer = signer();
    let signable = sample_signable();
    let mut field = sign_data(&signer, &signable).expect("sign");

    field.timestamp = "not-a-timestamp".to_string();
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &field,
        &VerifyOptions::default()
    ));

    let mut empty_nonce = sign_data(&signer, &signable).expect("sign");
    empty_nonce.nonce.clear();
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &empty_nonce,
        &VerifyOptions::default()
    ));

    let mut long_nonce = sign_data(&signer, &signable).expect("sign");
    long_nonce.nonce = "n".repeat(65);
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &long_nonce,
        &VerifyOptions::default()
    ));

    let mut bad_base64 = sign_data(&signer, &signable).expect("sign");
    bad_base64.signature = "%%% not base64 %%%".to_string();
    assert!(!verify_signed_data(
        &signer,
        &signable,
        &bad_base64,
        &VerifyOptions::default()
    ));
}
