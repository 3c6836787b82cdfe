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

//! Path policies: parsing, validation, and namespace authorization.
//!
//! The server owns an ordered policy list; the first policy whose `parse`
//! returns a value wins. Known policies live in the [`AnyPolicy`] sum type;
//! deployments can extend it through the `Custom` variant.

use crate::core::account::PUBLIC_KEY_PREFIX;
use crate::core::errors::Error;

/// Request operation kinds a policy can authorize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Read object bytes.
    Get,
    /// Create or overwrite an object.
    Put,
    /// Remove an object.
    Delete,
    /// Query object metadata by criteria.
    Search,
    /// Read object metadata.
    Metadata,
}

/// Outcome of parsing a path under some policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPath {
    /// The full path as given.
    pub full: String,
    /// Owner public-key string derived from the path.
    pub owner: String,
    /// Path remainder below the owner namespace.
    pub relative: String,
}

/// A path policy. `parse` is total and never fails; validation and access
/// checks report through the protocol taxonomy.
pub trait PathPolicy: Send + Sync {
    /// Try to interpret a path under this policy.
    fn parse(&self, path: &str) -> Option<ParsedPath>;

    /// Whether `account` (a public-key string) may perform `op` on the path.
    fn check_access(&self, account: &str, parsed: &ParsedPath, op: Operation) -> bool;

    /// Public-key string whose signature authorizes pre-signed URLs for this
    /// path, or `None` when the request must name the signer explicitly.
    fn authorized_signer(&self, parsed: &ParsedPath) -> Option<String>;
}

/// Structural validation shared by all policies: rejects traversal segments,
/// empty segments, and non-absolute paths.
pub fn validate_segments(path: &str) -> Result<(), Error> {
    if !path.starts_with('/') {
        return Err(Error::InvalidPath("path must be absolute".into()));
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(Error::InvalidPath("empty path segment".into())),
            "." | ".." => {
                return Err(Error::InvalidPath("traversal segments are not allowed".into()))
            }
            _ => {}
        }
    }
    Ok(())
}

/// The default namespace policy: `/user/<publicKeyString>/<relative...>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserPathPolicy;

impl PathPolicy for UserPathPolicy {
    fn parse(&self, path: &str) -> Option<ParsedPath> {
        let rest = path.strip_prefix("/user/")?;
        let (owner, relative) = rest.split_once('/')?;
        if !owner.starts_with(PUBLIC_KEY_PREFIX) || relative.is_empty() {
            return None;
        }
        Some(ParsedPath {
            full: path.to_string(),
            owner: owner.to_string(),
            relative: relative.to_string(),
        })
    }

    fn check_access(&self, account: &str, parsed: &ParsedPath, _op: Operation) -> bool {
        parsed.owner == account
    }

    fn authorized_signer(&self, parsed: &ParsedPath) -> Option<String> {
        Some(parsed.owner.clone())
    }
}

/// Tagged policy variants known to the server, plus an open extension point.
pub enum AnyPolicy {
    /// The default owner-namespace policy.
    User(UserPathPolicy),
    /// A deployment-provided policy.
    Custom(Box<dyn PathPolicy>),
}

impl PathPolicy for AnyPolicy {
    fn parse(&self, path: &str) -> Option<ParsedPath> {
        match self {
            AnyPolicy::User(p) => p.parse(path),
            AnyPolicy::Custom(p) => p.parse(path),
        }
    }

    fn check_access(&self, account: &str, parsed: &ParsedPath, op: Operation) -> bool {
        match self {
            AnyPolicy::User(p) => p.check_access(account, parsed, op),
            AnyPolicy::Custom(p) => p.check_access(account, parsed, op),
        }
    }

    fn authorized_signer(&self, parsed: &ParsedPath) -> Option<String> {
        match self {
            AnyPolicy::User(p) => p.authorized_signer(parsed),
            AnyPolicy::Custom(p) => p.authorized_signer(parsed),
        }
    }
}

/// Find the first policy that parses `path`.
pub fn resolve<'a>(policies: &'a [AnyPolicy], path: &str) -> Option<(&'a AnyPolicy, ParsedPath)> {
    for policy in policies {
        if let Some(parsed) = policy.parse(path) {
            return Some((policy, parsed));
        }
    }
    None
}

/// Parse, validate, and authorize a path for an operation.
pub fn assert_path_access(
    policies: &[AnyPolicy],
    account: &str,
    path: &str,
    op: Operation,
) -> Result<ParsedPath, Error> {
    let (policy, parsed) =
        resolve(policies, path).ok_or_else(|| Error::InvalidPath("no policy matches".into()))?;
    validate_segments(path)?;
    if !policy.check_access(account, &parsed, op) {
        return Err(Error::AccessDenied(
            "path belongs to another account's namespace".into(),
        ));
    }
    Ok(parsed)
}
