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

//! In-memory storage backend.
//!
//! A single mutex guards the object map and reservation table, making every
//! operation transactional. Iteration order is the `BTreeMap` path order,
//! which keeps search cursors stable.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::core::errors::Error;
use crate::core::types::{
    Pagination, QuotaLimits, QuotaStatus, Reservation, SearchCriteria, SearchResults,
    StorageObject,
};
use crate::storage::{
    matches_criteria, quota_status_from, reservation_delta, reservation_expired, PutOptions,
    QuotaCheck, ReserveOptions, StorageBackend, StoredEntry,
};

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredEntry>,
    reservations: HashMap<String, Reservation>,
}

impl State {
    fn prune(&mut self) {
        let now = Utc::now();
        self.reservations.retain(|_, r| !reservation_expired(r, now));
    }

    fn usage(&self, owner: &str, exclude: Option<&str>) -> QuotaCheck {
        let mut used_objects = 0u64;
        let mut used_size = 0u64;
        for entry in self.objects.values() {
            if entry.metadata.owner == owner {
                used_objects += 1;
                used_size += entry.metadata.size;
            }
        }
        let mut reserved_new_objects = 0u64;
        let mut reserved_size = 0u64;
        for r in self.reservations.values() {
            if r.owner != owner || exclude == Some(r.id.as_str()) {
                continue;
            }
            if !self.objects.contains_key(&r.path) {
                reserved_new_objects += 1;
            }
            reserved_size += r.size;
        }
        QuotaCheck {
            used_objects,
            used_size,
            reserved_new_objects,
            reserved_size,
        }
    }
}

/// In-memory [`StorageBackend`].
pub struct MemoryBackend {
    limits: QuotaLimits,
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create with explicit limits.
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(QuotaLimits::default())
    }
}

impl MemoryBackend {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, Error> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("state lock poisoned".into()))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        opts: PutOptions,
    ) -> Result<StorageObject, Error> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let previous = state.objects.get(path).map(|e| e.metadata.created_at);
        let metadata = StorageObject {
            path: path.to_string(),
            owner: opts.owner,
            tags: opts.tags,
            visibility: opts.visibility,
            size: data.len() as u64,
            created_at: previous.unwrap_or(now),
            updated_at: previous.map(|_| now),
        };
        state.objects.insert(
            path.to_string(),
            StoredEntry {
                data: data.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(metadata)
    }

    async fn get(&self, path: &str) -> Result<Option<StoredEntry>, Error> {
        let state = self.lock()?;
        Ok(state.objects.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<bool, Error> {
        let mut state = self.lock()?;
        Ok(state.objects.remove(path).is_some())
    }

    async fn search(
        &self,
        criteria: &SearchCriteria,
        page: &Pagination,
    ) -> Result<SearchResults, Error> {
        let state = self.lock()?;
        let limit = page.limit.unwrap_or(self.limits.max_search_limit) as usize;

        let lower = match &page.cursor {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };
        let mut results = Vec::new();
        for (_, entry) in state.objects.range::<String, _>((lower, Bound::Unbounded)) {
            if results.len() >= limit {
                break;
            }
            if matches_criteria(&entry.metadata, criteria) {
                results.push(entry.metadata.clone());
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
        let mut state = self.lock()?;
        state.prune();
        let usage = state.usage(owner, None);
        Ok(quota_status_from(&usage, &self.limits))
    }

    async fn reserve_upload(
        &self,
        owner: &str,
        path: &str,
        size: i64,
        opts: ReserveOptions,
    ) -> Result<Reservation, Error> {
        let mut state = self.lock()?;
        state.prune();

        let existing_size = state.objects.get(path).map(|e| e.metadata.size);
        let delta = reservation_delta(size, existing_size)?;
        let new_object = existing_size.is_none();
        let limits = opts.quota_limits.unwrap_or(self.limits);
        let now = Utc::now();
        let expires_at = now + Duration::milliseconds(opts.ttl_ms as i64);

        let adopted = state
            .reservations
            .values()
            .find(|r| r.owner == owner && r.path == path)
            .map(|r| r.id.clone());

        match adopted {
            Some(id) => {
                let widened = state
                    .reservations
                    .get(&id)
                    .map(|r| r.size.max(delta))
                    .unwrap_or(delta);
                let usage = state.usage(owner, Some(&id));
                usage.admit(&limits, widened, size as u64, new_object)?;
                let reservation = state
                    .reservations
                    .get_mut(&id)
                    .ok_or_else(|| Error::Internal("reservation vanished".into()))?;
                reservation.size = widened;
                reservation.expires_at = expires_at;
                Ok(reservation.clone())
            }
            None => {
                let usage = state.usage(owner, None);
                usage.admit(&limits, delta, size as u64, new_object)?;
                let reservation = Reservation {
                    id: uuid::Uuid::new_v4().to_string(),
                    owner: owner.to_string(),
                    path: path.to_string(),
                    size: delta,
                    created_at: now,
                    expires_at,
                };
                state
                    .reservations
                    .insert(reservation.id.clone(), reservation.clone());
                Ok(reservation)
            }
        }
    }

    async fn commit_upload(&self, id: &str) -> Result<(), Error> {
        let mut state = self.lock()?;
        state.reservations.remove(id);
        Ok(())
    }

    async fn release_upload(&self, id: &str) -> Result<(), Error> {
        let mut state = self.lock()?;
        state.reservations.remove(id);
        Ok(())
    }
}
