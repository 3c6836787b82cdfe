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

//! The anchor HTTP server.
//!
//! Routes:
//!
//! | Method & route                | Auth        |
//! |-------------------------------|-------------|
//! | `PUT    /api/object/<path>`   | URL-signed  |
//! | `GET    /api/object/<path>`   | URL-signed  |
//! | `DELETE /api/object/<path>`   | URL-signed  |
//! | `GET    /api/metadata/<path>` | URL-signed  |
//! | `POST   /api/search`          | body-signed |
//! | `GET    /api/quota`           | URL-signed  |
//! | `GET    /api/public/<path>`   | pre-signed  |
//! | `GET    /metrics`, `/healthz` | none        |

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use tracing::info;

use crate::core::errors::Error;
use crate::monitoring::metrics::Metrics;

/// Request authentication helpers.
pub mod auth;
/// Server configuration.
pub mod config;
mod routes;

pub use config::{ContentValidator, ServerConfig, TagValidation};

/// Shared per-server state.
pub struct AppState {
    /// Server configuration, owned by value.
    pub config: ServerConfig,
    /// Prometheus metrics.
    pub metrics: Metrics,
}

pub(crate) type SharedState = Arc<AppState>;

/// The anchor server.
pub struct AnchorServer {
    state: SharedState,
}

impl AnchorServer {
    /// Validate the configuration and build the server.
    pub fn new(config: ServerConfig) -> Result<Self, Error> {
        config.validate()?;
        let metrics = Metrics::new().map_err(|_| Error::Internal("metrics init".into()))?;
        Ok(Self {
            state: Arc::new(AppState { config, metrics }),
        })
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        // Leave the raw-body routes room for the largest object plus
        // envelope overhead.
        let body_limit = self.state.config.quotas.max_object_size as usize + 64 * 1024;

        Router::new()
            .route(
                "/api/object/*path",
                put(routes::put_object)
                    .get(routes::get_object)
                    .delete(routes::delete_object),
            )
            .route("/api/metadata/*path", get(routes::get_metadata))
            .route("/api/search", post(routes::search))
            .route("/api/quota", get(routes::quota))
            .route("/api/public/*path", get(routes::get_public))
            .route("/metrics", get(routes::metrics))
            .route("/healthz", get(routes::healthz))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                track_requests,
            ))
            .with_state(self.state.clone())
    }

    /// Serve on an already-bound listener until the task is cancelled.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<(), Error> {
        let addr = listener
            .local_addr()
            .map_err(|e| Error::Internal(format!("listener addr: {e}")))?;
        info!(%addr, anchor = %self.state.config.anchor_account.public_key_string(), "anchor serving");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Internal(format!("serve: {e}")))
    }
}

async fn track_requests(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    state.metrics.http_requests_total.inc();
    let response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        state.metrics.http_errors_total.inc();
    }
    response
}
