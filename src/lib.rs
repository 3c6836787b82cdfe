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

//! Anchorstore - end-to-end-encrypted object storage.
//!
//! This repository provides:
//! - A DER-encoded multi-principal encrypted container format
//! - Keypair accounts (Ed25519 signing, X25519 asymmetric encryption)
//! - A signed-request envelope with nonce, timestamp, and skew policy
//! - A storage backend contract with quota-accounted upload reservations
//!   (in-memory and sled implementations)
//! - The anchor HTTP server and a typed client with pre-signed public URLs
//! - Monitoring via Prometheus metrics and structured JSON logging

/// Cryptographic and protocol nucleus (containers, accounts, signing, paths).
pub mod core;
/// Storage backend contract and implementations.
pub mod storage;
/// The anchor HTTP server.
pub mod server;
/// Typed anchor client.
pub mod client;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
