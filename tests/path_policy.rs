// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use anchorstore::core::account::Account;
use anchorstore::core::errors::Error;
use anchorstore::core::path::{
    assert_path_access, resolve, validate_segments, AnyPolicy, Operation, PathPolicy,
    UserPathPolicy,
};

const SEED: &str = "d698bcd1a0930e2e0cfbca84643b1e1e55eca9e4d3204da745ca7a3e659c6e3d";

fn owner_key(index: u32) -> String {
    Account::from_seed(SEED, index)
        .expect("account")
        .public_key_string()
}

fn policies() -> Vec<AnyPolicy> {
    vec![AnyPolicy::User(UserPathPolicy)]
}

#[test]
fn parse_extracts_owner_and_relative() {
    let owner = owner_key(0);
    let path = format!("/user/{owner}/docs/a.txt");
    let parsed = UserPathPolicy.parse(&path).expect("parse");
    assert_eq!(parsed.owner, owner);
    assert_eq!(parsed.relative, "docs/a.txt");
    assert_eq!(parsed.full, path);
}

#[test]
fn parse_is_total_and_returns_none_off_schema() {
    assert!(UserPathPolicy.parse("/other/abc/x").is_none());
    assert!(UserPathPolicy.parse("/user/not-an-account/x").is_none());
    assert!(UserPathPolicy.parse("/user/").is_none());
    let owner = owner_key(0);
    // Owner with no relative part.
    assert!(UserPathPolicy.parse(&format!("/user/{owner}")).is_none());
}

#[test]
fn traversal_segments_are_rejected() {
    for path in ["/a/../b", "/a/./b", "/a//b", "relative/path", "/a/b/"] {
        assert!(
            matches!(validate_segments(path), Err(Error::InvalidPath(_))),
            "path {path} slipped through"
        );
    }
    assert!(validate_segments("/a/b/c.txt").is_ok());
}

#[test]
fn owner_access_is_scoped_to_the_namespace() {
    let owner = owner_key(0);
    let intruder = owner_key(1);
    let path = format!("/user/{owner}/docs/a.txt");
    let parsed = UserPathPolicy.parse(&path).expect("parse");

    for op in [
        Operation::Get,
        Operation::Put,
        Operation::Delete,
        Operation::Search,
        Operation::Metadata,
    ] {
        assert!(UserPathPolicy.check_access(&owner, &parsed, op));
        assert!(!UserPathPolicy.check_access(&intruder, &parsed, op));
    }
}

#[test]
fn assert_path_access_reports_namespace_denials() {
    let owner = owner_key(0);
    let intruder = owner_key(1);
    let path = format!("/user/{owner}/docs/a.txt");
    let policies = policies();

    assert!(assert_path_access(&policies, &owner, &path, Operation::Get).is_ok());

    match assert_path_access(&policies, &intruder, &path, Operation::Get) {
        Err(Error::AccessDenied(detail)) => assert!(detail.contains("namespace")),
        other => panic!("expected AccessDenied, got {other:?}"),
    }

    match assert_path_access(&policies, &owner, "/nowhere/at/all", Operation::Get) {
        Err(Error::InvalidPath(_)) => {}
        other => panic!("expected InvalidPath, got {other:?}"),
    }

    let traversal = format!("/user/{owner}/docs/../escape");
    match assert_path_access(&policies, &owner, &traversal, Operation::Get) {
        Err(Error::InvalidPath(_)) => {}
        other => panic!("expected InvalidPath, got {other:?}"),
    }
}

#[test]
fn first_matching_policy_wins() {
    let owner = owner_key(0);
    let path = format!("/user/{owner}/docs/a.txt");
    let policy_set = policies();
    let (policy, parsed) = resolve(&policy_set, &path).expect("resolve");
    assert_eq!(policy.authorized_signer(&parsed), Some(owner));
}
