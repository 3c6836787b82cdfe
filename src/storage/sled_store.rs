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

//! Persistent storage backend on sled.
//!
//! Metadata and blob bytes live in separate trees so quota scans and search
//! never touch object data. Records use the canonical bincode encoding.
//! Reservations are wall-clock holds and stay in memory beside the db; they
//! do not survive a restart, which only means a client retries its upload.

use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;

use crate::core::errors::Error;
use crate::core::types::{
    decode_canonical_limited, encode_canonical, Pagination, QuotaLimits, QuotaStatus, Reservation,
    SearchCriteria, SearchResults, StorageObject,
};
use crate::storage::{
    matches_criteria, quota_status_from, reservation_delta, reservation_expired, PutOptions,
    QuotaCheck, ReserveOptions, StorageBackend, StoredEntry,
};

const META_TREE: &str = "meta";
const DATA_TREE: &str = "data";

// Decode cap for metadata records.
const MAX_META_BYTES: usize = 64 * 1024;

/// Sled-backed [`StorageBackend`].
pub struct SledBackend {
    meta: sled::Tree,
    data: sled::Tree,
    limits: QuotaLimits,
    reservations: Mutex<HashMap<String, Reservation>>,
}

impl SledBackend {
    /// Open (or create) a database directory.
    pub fn open(path: &str, limits: QuotaLimits) -> Result<Self, Error> {
        let db = sled::open(path).map_err(|_| Error::ServiceUnavailable)?;
        let meta = db
            .open_tree(META_TREE)
            .map_err(|_| Error::ServiceUnavailable)?;
        let data = db
            .open_tree(DATA_TREE)
            .map_err(|_| Error::ServiceUnavailable)?;
        Ok(Self {
            meta,
            data,
            limits,
            reservations: Mutex::new(HashMap::new()),
        })
    }

    fn read_meta(&self, path: &str) -> Result<Option<StorageObject>, Error> {
        let Some(bytes) = self.meta.get(path).map_err(|_| Error::Internal("db io".into()))?
        else {
            return Ok(None);
        };
        let meta = decode_canonical_limited::<StorageObject>(&bytes, MAX_META_BYTES)
            .map_err(|_| Error::Internal("corrupt metadata record".into()))?;
        Ok(Some(meta))
    }

    fn usage(
        &self,
        owner: &str,
        reservations: &HashMap<String, Reservation>,
        exclude: Option<&str>,
    ) -> Result<QuotaCheck, Error> {
        let mut used_objects = 0u64;
        let mut used_size = 0u64;
        for item in self.meta.iter() {
            let (_, value) = item.map_err(|_| Error::Internal("db io".into()))?;
            let meta = decode_canonical_limited::<StorageObject>(&value, MAX_META_BYTES)
                .map_err(|_| Error::Internal("corrupt metadata record".into()))?;
            if meta.owner == owner {
                used_objects += 1;
                used_size += meta.size;
            }
        }
        let mut reserved_new_objects = 0u64;
        let mut reserved_size = 0u64;
        for r in reservations.values() {
            if r.owner != owner || exclude == Some(r.id.as_str()) {
                continue;
            }
            let exists = self
                .meta
                .contains_key(&r.path)
                .map_err(|_| Error::Internal("db io".into()))?;
            if !exists {
                reserved_new_objects += 1;
            }
            reserved_size += r.size;
        }
        Ok(QuotaCheck {
            used_objects,
            used_size,
            reserved_new_objects,
            reserved_size,
        })
    }

    fn lock_reservations(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Reservation>>, Error> {
        self.reservations
            .lock()
            .map_err(|_| Error::Internal("reservation lock poisoned".into()))
    }
}

fn prune(reservations: &mut HashMap<String, Reservation>) {
    let now = Utc::now();
    reservations.retain(|_, r| !reservation_expired(r, now));
}

#[async_trait]
impl StorageBackend for SledBackend {
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        opts: PutOptions,
    ) -> Result<StorageObject, Error> {
        let now = Utc::now();
        let previous = self.read_meta(path)?.map(|m| m.created_at);
        let metadata = StorageObject {
            path: path.to_string(),
            owner: opts.owner,
            tags: opts.tags,
            visibility: opts.visibility,
            size: data.len() as u64,
            created_at: previous.unwrap_or(now),
            updated_at: previous.map(|_| now),
        };
        let meta_bytes =
            encode_canonical(&metadata).map_err(|_| Error::Internal("metadata encode".into()))?;

        (&self.meta, &self.data)
            .transaction(|(meta_tree, data_tree)| {
                meta_tree.insert(path, meta_bytes.as_slice())?;
                data_tree.insert(path, data)?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|_| Error::Internal("db transaction".into()))?;

        Ok(metadata)
    }

    async fn get(&self, path: &str) -> Result<Option<StoredEntry>, Error> {
        let Some(metadata) = self.read_meta(path)? else {
            return Ok(None);
        };
        let Some(bytes) = self.data.get(path).map_err(|_| Error::Internal("db io".into()))?
        else {
            return Ok(None);
        };
        Ok(Some(StoredEntry {
            data: bytes.to_vec(),
            metadata,
        }))
    }

    async fn delete(&self, path: &str) -> Result<bool, Error> {
        let removed = (&self.meta, &self.data)
            .transaction(|(meta_tree, data_tree)| {
                let had = meta_tree.remove(path)?.is_some();
                data_tree.remove(path)?;
                Ok::<bool, ConflictableTransactionError<()>>(had)
            })
            .map_err(|_| Error::Internal("db transaction".into()))?;
        Ok(removed)
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
        page: &Pagination,
    ) -> Result<SearchResults, Error> {
        let limit = page.limit.unwrap_or(self.limits.max_search_limit) as usize;
        let lower = match &page.cursor {
            Some(cursor) => Bound::Excluded(cursor.as_bytes().to_vec()),
            None => Bound::Unbounded,
        };

        let mut results = Vec::new();
        for item in self.meta.range::<Vec<u8>, _>((lower, Bound::Unbounded)) {
            if results.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(|_| Error::Internal("db io".into()))?;
            let meta = decode_canonical_limited::<StorageObject>(&value, MAX_META_BYTES)
                .map_err(|_| Error::Internal("corrupt metadata record".into()))?;
            if matches_criteria(&meta, criteria) {
                results.push(meta);
            }
        }
        let next_cursor = if results.len() == limit && limit > 0 {
            results.last().map(|m| m.path.clone())
        } else {
            None
        };
        Ok(SearchResults {
            results,
            next_cursor,
        })
    }

    async fn quota_status(&self, owner: &str) -> Result<QuotaStatus, Error> {
        let mut reservations = self.lock_reservations()?;
        prune(&mut reservations);
        let usage = self.usage(owner, &reservations, None)?;
        Ok(quota_status_from(&usage, &self.limits))
    }

    async fn reserve_upload(
        &self,
        owner: &str,
        path: &str,
        size: i64,
        opts: ReserveOptions,
    ) -> Result<Reservation, Error> {
        let mut reservations = self.lock_reservations()?;
        prune(&mut reservations);

        let existing_size = self.read_meta(path)?.map(|m| m.size);
        let delta = reservation_delta(size, existing_size)?;
        let new_object = existing_size.is_none();
        let limits = opts.quota_limits.unwrap_or(self.limits);
        let now = Utc::now();
        let expires_at = now + Duration::milliseconds(opts.ttl_ms as i64);

        let adopted = reservations
            .values()
            .find(|r| r.owner == owner && r.path == path)
            .map(|r| r.id.clone());

        match adopted {
            Some(id) => {
                let widened = reservations
                    .get(&id)
                    .map(|r| r.size.max(delta))
                    .unwrap_or(delta);
                let usage = self.usage(owner, &reservations, Some(&id))?;
                usage.admit(&limits, widened, size as u64, new_object)?;
                let reservation = reservations
                    .get_mut(&id)
                    .ok_or_else(|| Error::Internal("reservation vanished".into()))?;
                reservation.size = widened;
                reservation.expires_at = expires_at;
                Ok(reservation.clone())
            }
            None => {
                let usage = self.usage(owner, &reservations, None)?;
                usage.admit(&limits, delta, size as u64, new_object)?;
                let reservation = Reservation {
                    id: uuid::Uuid::new_v4().to_string(),
                    owner: owner.to_string(),
                    path: path.to_string(),
                    size: delta,
                    created_at: now,
                    expires_at,
                };
                reservations.insert(reservation.id.clone(), reservation.clone());
                Ok(reservation)
            }
        }
    }

    async fn commit_upload(&self, id: &str) -> Result<(), Error> {
        let mut reservations = self.lock_reservations()?;
        reservations.remove(id);
        Ok(())
    }

    async fn release_upload(&self, id: &str) -> Result<(), Error> {
        let mut reservations = self.lock_reservations()?;
        reservations.remove(id);
        Ok(())
    }
}
