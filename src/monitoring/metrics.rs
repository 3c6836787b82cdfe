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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Requests served, all routes.
    pub http_requests_total: IntCounter,
    /// Requests that ended in a protocol error.
    pub http_errors_total: IntCounter,
    /// Objects currently stored.
    pub objects_stored: IntGauge,
    /// Ciphertext bytes currently stored.
    pub bytes_stored: IntGauge,
    /// Objects written.
    pub objects_put_total: IntCounter,
    /// Objects deleted.
    pub objects_deleted_total: IntCounter,
    /// Public pre-signed fetches served.
    pub public_fetch_total: IntCounter,
    /// Uploads rejected for quota reasons.
    pub quota_rejected_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("anchorstore_http_requests_total", "Requests served")
                .map_err(|_| MetricsError::Prom)?;
        let http_errors_total =
            IntCounter::new("anchorstore_http_errors_total", "Requests that errored")
                .map_err(|_| MetricsError::Prom)?;
        let objects_stored =
            IntGauge::new("anchorstore_objects_stored", "Objects currently stored")
                .map_err(|_| MetricsError::Prom)?;
        let bytes_stored =
            IntGauge::new("anchorstore_bytes_stored", "Ciphertext bytes currently stored")
                .map_err(|_| MetricsError::Prom)?;
        let objects_put_total =
            IntCounter::new("anchorstore_objects_put_total", "Objects written")
                .map_err(|_| MetricsError::Prom)?;
        let objects_deleted_total =
            IntCounter::new("anchorstore_objects_deleted_total", "Objects deleted")
                .map_err(|_| MetricsError::Prom)?;
        let public_fetch_total =
            IntCounter::new("anchorstore_public_fetch_total", "Public fetches served")
                .map_err(|_| MetricsError::Prom)?;
        let quota_rejected_total =
            IntCounter::new("anchorstore_quota_rejected_total", "Quota rejections")
                .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(http_errors_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(objects_stored.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(bytes_stored.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(objects_put_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(objects_deleted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(public_fetch_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(quota_rejected_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            http_requests_total,
            http_errors_total,
            objects_stored,
            bytes_stored,
            objects_put_total,
            objects_deleted_total,
            public_fetch_total,
            quota_rejected_total,
        })
    }
}
