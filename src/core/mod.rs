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

//! Cryptographic and protocol nucleus.

/// Keypair accounts (sign/verify, asymmetric encryption).
pub mod account;
/// Strict DER codec for the container format.
pub mod asn1;
/// Multi-principal encrypted container.
pub mod container;
/// Protocol error taxonomy with stable wire codes.
pub mod errors;
/// Anchor key material at rest.
pub mod keystore;
/// Path policies and namespace authorization.
pub mod path;
/// Signing envelope for authenticated requests.
pub mod signing;
/// Protocol data model and canonical encoding.
pub mod types;
