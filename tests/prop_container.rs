// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;

use anchorstore::core::account::Account;
use anchorstore::core::container::{Cipher, Container, ContainerOptions};

const SEED: &str = "d698bcd1a0930e2e0cfbca84643b1e1e55eca9e4d3204da745ca7a3e659c6e3d";

fn account(index: u32) -> Account {
    Account::from_seed(SEED, index).expect("account from seed")
}

fn cipher(gcm: bool) -> Cipher {
    if gcm {
        Cipher::Aes256Gcm
    } else {
        Cipher::Aes256Cbc
    }
}

proptest! {
    #[test]
    fn roundtrip_for_any_plaintext(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        gcm in any::<bool>(),
    ) {
        let a1 = account(0);
        let container = Container::from_plaintext(
            &plaintext,
            std::slice::from_ref(&a1),
            ContainerOptions { cipher: cipher(gcm), ..ContainerOptions::default() },
        ).expect("build");
        let encoded = container.encode().expect("encode");

        let reopened = Container::from_encrypted(&encoded, std::slice::from_ref(&a1))
            .expect("reopen");
        prop_assert_eq!(reopened.plaintext().expect("plaintext"), plaintext);
    }

    #[test]
    fn plaintext_buffers_are_isolated(
        plaintext in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        let a1 = account(0);
        let container = Container::from_plaintext(
            &plaintext,
            std::slice::from_ref(&a1),
            ContainerOptions::default(),
        ).expect("build");

        let mut first = container.plaintext().expect("plaintext");
        for byte in first.iter_mut() {
            *byte = byte.wrapping_add(1);
        }
        prop_assert_eq!(container.plaintext().expect("plaintext"), plaintext);
    }

    #[test]
    fn encoding_is_deterministic(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        gcm in any::<bool>(),
    ) {
        let a1 = account(0);
        let container = Container::from_plaintext(
            &plaintext,
            std::slice::from_ref(&a1),
            ContainerOptions { cipher: cipher(gcm), ..ContainerOptions::default() },
        ).expect("build");
        let first = container.encode().expect("encode");
        let second = container.encode().expect("encode");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn revoked_accounts_stay_locked_out(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let a1 = account(0);
        let a2 = account(1);
        let mut container = Container::from_plaintext(
            &plaintext,
            &[a1.clone(), a2.clone()],
            ContainerOptions::default(),
        ).expect("build");
        container.revoke_access(&a2).expect("revoke");
        let encoded = container.encode().expect("encode");

        let revoked = Container::from_encrypted(&encoded, std::slice::from_ref(&a2))
            .expect("parse");
        prop_assert!(revoked.plaintext().is_err());

        let keeper = Container::from_encrypted(&encoded, std::slice::from_ref(&a1))
            .expect("parse");
        prop_assert_eq!(keeper.plaintext().expect("plaintext"), plaintext);
    }
}
