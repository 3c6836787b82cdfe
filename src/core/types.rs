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

//! Protocol data model and canonical encoding helpers.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::core::errors::Error;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization")]
    Serialize,
    #[error("deserialization")]
    Deserialize,
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules.
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// Per-object visibility.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone with a valid pre-signed URL may read the plaintext; the anchor
    /// must be a container principal.
    Public,
    /// Only container principals can read.
    Private,
}

impl Visibility {
    /// Wire string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    /// Parse the wire string form.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(Error::InvalidArgument(format!(
                "unknown visibility '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored object metadata.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageObject {
    /// Full object path.
    pub path: String,
    /// Canonical public-key string of the namespace owner.
    pub owner: String,
    /// Plaintext metadata tags, in insertion order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Visibility flag.
    pub visibility: Visibility,
    /// Stored ciphertext size in bytes.
    pub size: u64,
    /// Creation time; immutable across overwrites.
    pub created_at: DateTime<Utc>,
    /// Set iff the path pre-existed at the last PUT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Configured quota limits. All fields must be positive.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotaLimits {
    /// Largest accepted object, in bytes.
    pub max_object_size: u64,
    /// Most objects a single owner may hold.
    pub max_objects_per_user: u64,
    /// Total bytes a single owner may hold.
    pub max_storage_per_user: u64,
    /// Largest accepted search page.
    pub max_search_limit: u64,
    /// Longest accepted pre-signed URL validity, in seconds.
    pub max_signed_url_ttl: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_object_size: 10 * 1024 * 1024,
            max_objects_per_user: 1000,
            max_storage_per_user: 100 * 1024 * 1024,
            max_search_limit: 100,
            max_signed_url_ttl: 86_400,
        }
    }
}

impl QuotaLimits {
    /// Reject zero limits.
    pub fn validate(&self) -> Result<(), Error> {
        let fields = [
            ("maxObjectSize", self.max_object_size),
            ("maxObjectsPerUser", self.max_objects_per_user),
            ("maxStoragePerUser", self.max_storage_per_user),
            ("maxSearchLimit", self.max_search_limit),
            ("maxSignedUrlTTL", self.max_signed_url_ttl),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Error::InvalidArgument(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// Owner quota usage, including live reservations.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    /// Committed objects plus reservations for new paths.
    pub object_count: u64,
    /// Committed bytes plus reserved deltas.
    pub total_size: u64,
    /// `max(0, limit - used)` for object count.
    pub remaining_objects: u64,
    /// `max(0, limit - used)` for bytes.
    pub remaining_size: u64,
}

/// A live upload reservation. `size` is the quota delta the upload would
/// consume (requested size minus any existing object at the path, clamped to
/// zero), not the absolute payload size.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Opaque reservation id.
    pub id: String,
    /// Owner public-key string.
    pub owner: String,
    /// Target path.
    pub path: String,
    /// Size delta held against the owner's quota.
    pub size: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Wall-clock expiry.
    pub expires_at: DateTime<Utc>,
}

/// Search filter criteria; present fields combine with AND.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    /// Path prefix. Non-recursive unless `recursive` is set: the remainder
    /// after the prefix must not contain `/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Disable the non-recursive cut for `path_prefix`.
    pub recursive: bool,
    /// Match objects sharing at least one tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Substring match on the final path segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owner equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Visibility equality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// Cursor pagination. The cursor is the path of the last returned record.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    /// Page size; clamped to the configured search limit by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Resume after this path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One page of search results.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Matching objects in path order.
    pub results: Vec<StorageObject>,
    /// Present iff more results may exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Decrypted object payload carried inside a container.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPayload {
    /// MIME type of `data`.
    pub mime_type: String,
    /// Object content.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ObjectPayload {
    /// Serialize to the canonical JSON plaintext form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Internal(format!("payload encode: {e}")))
    }

    /// Parse the canonical JSON plaintext form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidResponse(format!("payload decode: {e}")))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}
