// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Request authentication: URL-signed and body-signed envelopes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::account::Account;
use crate::core::errors::Error;
use crate::core::signing::{
    verify_signed_data, HttpSignedField, SignableValue, VerifyOptions, DEFAULT_MAX_SKEW_MS,
};

/// Pull the signed field out of URL query parameters
/// (`signed.nonce`, `signed.timestamp`, `signed.signature`).
pub fn signed_from_query(query: &HashMap<String, String>) -> Result<HttpSignedField, Error> {
    let nonce = query.get("signed.nonce").ok_or(Error::SignatureInvalid)?;
    let timestamp = query.get("signed.timestamp").ok_or(Error::SignatureInvalid)?;
    let signature = query.get("signed.signature").ok_or(Error::SignatureInvalid)?;
    Ok(HttpSignedField {
        nonce: nonce.clone(),
        timestamp: timestamp.clone(),
        signature: signature.clone(),
    })
}

/// Resolve the `account` query parameter into a public account.
pub fn account_from_query(query: &HashMap<String, String>) -> Result<Account, Error> {
    let raw = query.get("account").ok_or(Error::AccountRequired)?;
    Account::from_public_key_string(raw).map_err(|_| Error::SignatureInvalid)
}

/// Verify a signed field, distinguishing expiry from other failures.
pub fn verify_or_reject(
    account: &Account,
    signable: &[SignableValue],
    field: &HttpSignedField,
    max_skew_ms: i64,
) -> Result<(), Error> {
    // Report skew separately so expired links read as expired, not invalid.
    if let Ok(ts) = DateTime::parse_from_rfc3339(&field.timestamp) {
        let skew = Utc::now()
            .signed_duration_since(ts.with_timezone(&Utc))
            .num_milliseconds();
        if skew.abs() > max_skew_ms {
            return Err(Error::SignatureExpired);
        }
    }
    let opts = VerifyOptions {
        max_skew_ms,
        now: None,
    };
    if !verify_signed_data(account, signable, field, &opts) {
        return Err(Error::SignatureInvalid);
    }
    Ok(())
}

/// Authenticate a URL-signed request: parse the account and signed field
/// from the query and verify the signable under the default skew policy.
pub fn authenticate_url(
    query: &HashMap<String, String>,
    signable: &[SignableValue],
) -> Result<Account, Error> {
    let account = account_from_query(query)?;
    let field = signed_from_query(query)?;
    verify_or_reject(&account, signable, &field, DEFAULT_MAX_SKEW_MS)?;
    Ok(account)
}
