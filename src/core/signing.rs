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

//! Signing envelope for authenticated requests.
//!
//! A signable is a finite ordered sequence of primitive values. Before
//! signing, the sequence is extended with a nonce, a timestamp, and the
//! signer's public-key string, then serialized into a canonical
//! length-prefixed byte form that both sides reconstruct independently.
//!
//! ## Canonical bytes
//!
//! ```text
//! v1\n
//! s<len>:<utf8 bytes>\n      -- string
//! i:<decimal>\n              -- integer
//! b<len>:<raw bytes>\n       -- bytes
//! t:<0|1>\n                  -- boolean
//! ```
//!
//! Length prefixes make the form unambiguous regardless of embedded
//! separators.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::core::account::Account;
use crate::core::errors::Error;

/// Default accepted clock skew for signed requests, in milliseconds.
pub const DEFAULT_MAX_SKEW_MS: i64 = 300_000;

const NONCE_MAX_LEN: usize = 64;

/// One primitive element of a signable sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignableValue {
    /// UTF-8 string.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Boolean.
    Bool(bool),
}

impl From<&str> for SignableValue {
    fn from(s: &str) -> Self {
        SignableValue::Str(s.to_string())
    }
}

impl From<i64> for SignableValue {
    fn from(v: i64) -> Self {
        SignableValue::Int(v)
    }
}

/// Signed request field carried in the URL query or JSON body.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpSignedField {
    /// Uniqueness token, 1..=64 characters.
    pub nonce: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Base64 Ed25519 signature over the canonical bytes.
    pub signature: String,
}

/// Verification policy.
#[derive(Clone, Debug)]
pub struct VerifyOptions {
    /// Allowed distance between the field timestamp and the verifier clock.
    pub max_skew_ms: i64,
    /// Verifier wall clock; `None` reads the system clock.
    pub now: Option<DateTime<Utc>>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            max_skew_ms: DEFAULT_MAX_SKEW_MS,
            now: None,
        }
    }
}

/// Construct the canonical verification bytes for a signable sequence.
///
/// Generates the nonce (UUID v4) and timestamp (now, UTC) when absent, and
/// returns `(nonce, timestamp, verification_bytes)`.
pub fn format_data(
    signer: &Account,
    signable: &[SignableValue],
    nonce: Option<String>,
    timestamp: Option<String>,
) -> (String, String, Vec<u8>) {
    let nonce = nonce.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let timestamp =
        timestamp.unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(b"v1\n");
    for value in signable {
        push_value(&mut out, value);
    }
    push_value(&mut out, &SignableValue::Str(nonce.clone()));
    push_value(&mut out, &SignableValue::Str(timestamp.clone()));
    push_value(&mut out, &SignableValue::Str(signer.public_key_string()));

    (nonce, timestamp, out)
}

fn push_value(out: &mut Vec<u8>, value: &SignableValue) {
    match value {
        SignableValue::Str(s) => {
            out.extend_from_slice(format!("s{}:", s.len()).as_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        SignableValue::Int(v) => {
            out.extend_from_slice(format!("i:{v}").as_bytes());
        }
        SignableValue::Bytes(b) => {
            out.extend_from_slice(format!("b{}:", b.len()).as_bytes());
            out.extend_from_slice(b);
        }
        SignableValue::Bool(b) => {
            out.extend_from_slice(if *b { b"t:1" } else { b"t:0" });
        }
    }
    out.push(b'\n');
}

/// Sign a signable sequence, producing the wire field.
pub fn sign_data(signer: &Account, signable: &[SignableValue]) -> Result<HttpSignedField, Error> {
    let (nonce, timestamp, bytes) = format_data(signer, signable, None, None);
    let signature = BASE64.encode(signer.sign(&bytes)?);
    Ok(HttpSignedField {
        nonce,
        timestamp,
        signature,
    })
}

/// Canonical signable for GET/DELETE/METADATA requests.
pub fn object_signable(method: &str, path: &str) -> Vec<SignableValue> {
    vec![SignableValue::from(method), SignableValue::from(path)]
}

/// Canonical signable for PUT requests: method, path, visibility, and the
/// comma-joined tag list.
pub fn put_signable(path: &str, visibility: &str, tags: &[String]) -> Vec<SignableValue> {
    vec![
        SignableValue::from("PUT"),
        SignableValue::from(path),
        SignableValue::from(visibility),
        SignableValue::Str(tags.join(",")),
    ]
}

/// Canonical signable for quota queries.
pub fn quota_signable() -> Vec<SignableValue> {
    vec![SignableValue::from("QUOTA")]
}

/// Canonical signable for search requests over the serialized criteria.
pub fn search_signable(criteria_json: &str) -> Vec<SignableValue> {
    vec![SignableValue::from("SEARCH"), SignableValue::from(criteria_json)]
}

/// Canonical signable for pre-signed public URLs.
pub fn public_url_signable(path: &str, expires: i64) -> Vec<SignableValue> {
    vec![SignableValue::from(path), SignableValue::Int(expires)]
}

/// Verify a signed field against a signable sequence.
///
/// Tolerated structural faults (bad base64, malformed timestamp, nonce out
/// of range, clock skew) verify `false`; this function never panics.
pub fn verify_signed_data(
    account: &Account,
    signable: &[SignableValue],
    field: &HttpSignedField,
    opts: &VerifyOptions,
) -> bool {
    if field.nonce.is_empty() || field.nonce.len() > NONCE_MAX_LEN {
        return false;
    }
    let Ok(parsed) = DateTime::parse_from_rfc3339(&field.timestamp) else {
        return false;
    };
    let now = opts.now.unwrap_or_else(Utc::now);
    let skew = now
        .signed_duration_since(parsed.with_timezone(&Utc))
        .num_milliseconds();
    if skew.abs() > opts.max_skew_ms {
        return false;
    }
    let Ok(signature) = BASE64.decode(&field.signature) else {
        return false;
    };

    let (_, _, bytes) = format_data(
        account,
        signable,
        Some(field.nonce.clone()),
        Some(field.timestamp.clone()),
    );
    account.verify(&bytes, &signature)
}
