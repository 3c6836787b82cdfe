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

//! Storage backend contract.
//!
//! Backends store ciphertext blobs keyed by path and account for quota
//! through upload reservations: `reserve → put → commit`, with `release` on
//! any failure in between. A reservation holds the *size delta* the upload
//! would add (requested size minus any existing object at the path, clamped
//! to zero). At most one live reservation exists per `(owner, path)`; a
//! repeat reservation adopts it, extending the TTL and widening the held
//! size. Expired reservations are pruned on every quota read or reservation
//! attempt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::errors::Error;
use crate::core::types::{
    Pagination, QuotaLimits, QuotaStatus, Reservation, SearchCriteria, SearchResults,
    StorageObject, Visibility,
};

/// In-memory backend (test surface and default for tests).
pub mod memory;
/// Persistent sled-backed backend.
pub mod sled_store;

/// Default reservation TTL.
pub const DEFAULT_RESERVATION_TTL_MS: u64 = 60_000;

/// Metadata accompanying a put.
#[derive(Clone, Debug)]
pub struct PutOptions {
    /// Owner public-key string (derived from the path by the server).
    pub owner: String,
    /// Plaintext metadata tags.
    pub tags: Vec<String>,
    /// Visibility flag.
    pub visibility: Visibility,
}

/// A stored blob with its metadata.
#[derive(Clone, Debug)]
pub struct StoredEntry {
    /// Raw ciphertext bytes.
    pub data: Vec<u8>,
    /// Object metadata.
    pub metadata: StorageObject,
}

/// Options for [`StorageBackend::reserve_upload`].
#[derive(Clone, Debug)]
pub struct ReserveOptions {
    /// Reservation lifetime in milliseconds.
    pub ttl_ms: u64,
    /// Limits to enforce; `None` uses the backend's own limits.
    pub quota_limits: Option<QuotaLimits>,
}

impl Default for ReserveOptions {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_RESERVATION_TTL_MS,
            quota_limits: None,
        }
    }
}

/// The storage backend contract. Writes for the same `(owner, path)` are
/// serialized through the reservation mechanism; overwrites are
/// last-writer-wins on the same path.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create or overwrite the object at `path`. `createdAt` is preserved on
    /// overwrite and `updatedAt` set iff the path pre-existed.
    async fn put(&self, path: &str, data: &[u8], opts: PutOptions)
        -> Result<StorageObject, Error>;

    /// Fetch a stored object, or `None` when absent.
    async fn get(&self, path: &str) -> Result<Option<StoredEntry>, Error>;

    /// Delete an object; `true` iff something was removed.
    async fn delete(&self, path: &str) -> Result<bool, Error>;

    /// Query metadata by AND-combined criteria with cursor pagination.
    async fn search(
        &self,
        criteria: &SearchCriteria,
        page: &Pagination,
    ) -> Result<SearchResults, Error>;

    /// Quota usage for an owner, including live reservations.
    async fn quota_status(&self, owner: &str) -> Result<QuotaStatus, Error>;

    /// Reserve quota for an upcoming upload of `size` bytes to `path`.
    async fn reserve_upload(
        &self,
        owner: &str,
        path: &str,
        size: i64,
        opts: ReserveOptions,
    ) -> Result<Reservation, Error>;

    /// Settle a reservation after a successful put. Unknown ids are ignored.
    async fn commit_upload(&self, id: &str) -> Result<(), Error>;

    /// Drop a reservation without committing. Unknown ids are ignored.
    async fn release_upload(&self, id: &str) -> Result<(), Error>;
}

/// Final path segment (the object name).
pub(crate) fn final_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether metadata matches all present criteria.
pub(crate) fn matches_criteria(meta: &StorageObject, criteria: &SearchCriteria) -> bool {
    if let Some(prefix) = &criteria.path_prefix {
        let Some(rest) = meta.path.strip_prefix(prefix.as_str()) else {
            return false;
        };
        if !criteria.recursive && rest.contains('/') {
            return false;
        }
    }
    if let Some(tags) = &criteria.tags {
        if !tags.iter().any(|t| meta.tags.contains(t)) {
            return false;
        }
    }
    if let Some(name) = &criteria.name {
        if !final_segment(&meta.path).contains(name.as_str()) {
            return false;
        }
    }
    if let Some(owner) = &criteria.owner {
        if &meta.owner != owner {
            return false;
        }
    }
    if let Some(visibility) = criteria.visibility {
        if meta.visibility != visibility {
            return false;
        }
    }
    true
}

/// Shared reservation arithmetic over a pruned reservation set.
///
/// `existing_size` is the committed object size at the reservation path,
/// when one exists. Returns the delta the reservation must hold.
pub(crate) fn reservation_delta(size: i64, existing_size: Option<u64>) -> Result<u64, Error> {
    if size < 0 {
        return Err(Error::InvalidArgument("reservation size must be non-negative".into()));
    }
    Ok((size as u64).saturating_sub(existing_size.unwrap_or(0)))
}

/// Quota admission check for a reservation.
///
/// `used`: committed objects and bytes for the owner. `reserved`: live
/// reservation count for new paths and total held deltas, excluding any
/// reservation being replaced.
pub(crate) struct QuotaCheck {
    pub used_objects: u64,
    pub used_size: u64,
    pub reserved_new_objects: u64,
    pub reserved_size: u64,
}

impl QuotaCheck {
    pub(crate) fn admit(
        &self,
        limits: &QuotaLimits,
        delta: u64,
        absolute_size: u64,
        new_object: bool,
    ) -> Result<(), Error> {
        if absolute_size > limits.max_object_size {
            return Err(Error::QuotaExceeded(format!(
                "object size {absolute_size} exceeds limit {}",
                limits.max_object_size
            )));
        }
        let projected_objects =
            self.used_objects + self.reserved_new_objects + u64::from(new_object);
        if projected_objects > limits.max_objects_per_user {
            return Err(Error::QuotaExceeded(format!(
                "object count would exceed limit {}",
                limits.max_objects_per_user
            )));
        }
        let projected_size = self.used_size + self.reserved_size + delta;
        if projected_size > limits.max_storage_per_user {
            return Err(Error::QuotaExceeded(format!(
                "storage would exceed limit {}",
                limits.max_storage_per_user
            )));
        }
        Ok(())
    }
}

/// Compose a [`QuotaStatus`] from usage and the backend's limits.
pub(crate) fn quota_status_from(usage: &QuotaCheck, limits: &QuotaLimits) -> QuotaStatus {
    let object_count = usage.used_objects + usage.reserved_new_objects;
    let total_size = usage.used_size + usage.reserved_size;
    QuotaStatus {
        object_count,
        total_size,
        remaining_objects: limits.max_objects_per_user.saturating_sub(object_count),
        remaining_size: limits.max_storage_per_user.saturating_sub(total_size),
    }
}

/// Whether a reservation is expired at `now`.
pub(crate) fn reservation_expired(res: &Reservation, now: DateTime<Utc>) -> bool {
    res.expires_at <= now
}
