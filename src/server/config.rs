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
#![warn(missing_docs)]

//! Anchor server configuration.

use std::sync::Arc;

use regex::Regex;

use crate::core::account::Account;
use crate::core::errors::Error;
use crate::core::path::{AnyPolicy, UserPathPolicy};
use crate::core::types::QuotaLimits;
use crate::storage::StorageBackend;

/// Default pre-signed URL validity in seconds.
pub const DEFAULT_SIGNED_URL_TTL: u64 = 3_600;

/// Reservation TTL used by the PUT pipeline, in milliseconds.
pub const UPLOAD_RESERVATION_TTL_MS: u64 = 60_000;

/// Tag validation policy.
#[derive(Clone, Debug)]
pub struct TagValidation {
    /// Most tags per object.
    pub max_tags: usize,
    /// Longest accepted tag.
    pub max_tag_length: usize,
    /// Accepted tag shape.
    pub pattern: Regex,
}

impl Default for TagValidation {
    fn default() -> Self {
        Self {
            max_tags: 10,
            max_tag_length: 50,
            pattern: Regex::new("^[A-Za-z0-9_-]+$").expect("default tag pattern is valid"),
        }
    }
}

impl TagValidation {
    /// Validate a tag list against this policy.
    pub fn check(&self, tags: &[String]) -> Result<(), Error> {
        if tags.len() > self.max_tags {
            return Err(Error::InvalidTag(format!(
                "at most {} tags are allowed",
                self.max_tags
            )));
        }
        for tag in tags {
            if tag.len() > self.max_tag_length || !self.pattern.is_match(tag) {
                return Err(Error::InvalidTag(format!("tag '{tag}' is not acceptable")));
            }
        }
        Ok(())
    }
}

/// Namespace content validator: inspects decrypted payloads before a PUT is
/// admitted into paths the validator claims.
pub trait ContentValidator: Send + Sync {
    /// Whether this validator governs `path`.
    fn applies(&self, path: &str) -> bool;

    /// Validate content; an `Err` message surfaces as `ValidationFailed`.
    fn validate(&self, path: &str, content: &[u8], mime_type: &str) -> Result<(), String>;
}

/// Full server configuration.
pub struct ServerConfig {
    /// Storage backend.
    pub backend: Arc<dyn StorageBackend>,
    /// The anchor account; must hold its private key.
    pub anchor_account: Account,
    /// Ordered path policies; first parse wins.
    pub path_policies: Vec<AnyPolicy>,
    /// Quota limits enforced at the protocol edge.
    pub quotas: QuotaLimits,
    /// Namespace content validators.
    pub validators: Vec<Box<dyn ContentValidator>>,
    /// Default pre-signed URL validity in seconds.
    pub signed_url_default_ttl: u64,
    /// `Some(origin)` enables CORS on public endpoints.
    pub public_cors_origin: Option<String>,
    /// Tag validation policy.
    pub tag_validation: TagValidation,
}

impl ServerConfig {
    /// Configuration with defaults: the user path policy, default quotas, no
    /// validators, CORS disabled.
    pub fn new(backend: Arc<dyn StorageBackend>, anchor_account: Account) -> Self {
        Self {
            backend,
            anchor_account,
            path_policies: vec![AnyPolicy::User(UserPathPolicy)],
            quotas: QuotaLimits::default(),
            validators: Vec::new(),
            signed_url_default_ttl: DEFAULT_SIGNED_URL_TTL,
            public_cors_origin: None,
            tag_validation: TagValidation::default(),
        }
    }

    /// Reject unusable configurations.
    pub fn validate(&self) -> Result<(), Error> {
        self.quotas.validate()?;
        if self.path_policies.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one path policy is required".into(),
            ));
        }
        if !self.anchor_account.has_private_key() {
            return Err(Error::PrivateKeyRequired);
        }
        if self.signed_url_default_ttl == 0 {
            return Err(Error::InvalidArgument(
                "signedUrlDefaultTTL must be positive".into(),
            ));
        }
        if self.tag_validation.max_tags == 0 || self.tag_validation.max_tag_length == 0 {
            return Err(Error::InvalidArgument(
                "tag validation limits must be positive".into(),
            ));
        }
        Ok(())
    }
}
