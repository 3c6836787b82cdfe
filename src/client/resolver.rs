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

//! Endpoint resolution for the anchor client.
//!
//! Constructed explicitly and passed into the client; no process-global
//! state. `Default` reads `ANCHOR_ENDPOINT` for ergonomics.

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9090";

/// Maps the anchor service to its base URL.
#[derive(Clone, Debug)]
pub struct Resolver {
    endpoint: String,
}

impl Resolver {
    /// Resolver pinned to a base URL (no trailing slash).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self { endpoint }
    }

    /// Base URL of the anchor.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for Resolver {
    fn default() -> Self {
        let endpoint =
            std::env::var("ANCHOR_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(endpoint)
    }
}
