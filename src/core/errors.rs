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

//! Protocol error taxonomy.
//!
//! Every error kind carries a stable string code so a typed error survives
//! the JSON round-trip between server and client: the server serializes
//! `{ok:false, error, code, statusCode}`, the client recovers the variant
//! through [`Error::from_wire`] by dispatching on `code`. Internal errors
//! are never exposed verbatim; they surface as a generic 500.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::asn1::Asn1Error;

/// Protocol-wide error kinds.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Path failed schema or traversal validation.
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// A metadata tag failed validation.
    #[error("invalid tag: {0}")]
    InvalidTag(String),
    /// A request argument is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Container version is not supported by this implementation.
    #[error("unsupported container version {0}")]
    UnsupportedVersion(i64),
    /// A decoded value does not match the expected schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The request names no account to verify against.
    #[error("account parameter required")]
    AccountRequired,
    /// The path policy designates no signer and none was supplied.
    #[error("signer required")]
    SignerRequired,
    /// Signature verification failed.
    #[error("signature invalid")]
    SignatureInvalid,
    /// Signature timestamp or expiry is outside the accepted window.
    #[error("signature expired")]
    SignatureExpired,
    /// The authenticated account may not perform this operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// No object exists at the path.
    #[error("document not found")]
    DocumentNotFound,
    /// The operation would cross a quota limit.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// A namespace validator rejected the content.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// A public object must carry the anchor among its principals.
    #[error("public objects must include the anchor as a principal")]
    AnchorPrincipalRequired,

    /// The backend or configuration does not support the operation.
    #[error("operation not supported: {0}")]
    OperationNotSupported(String),
    /// The request used an authentication method this server does not accept.
    #[error("unsupported auth method")]
    UnsupportedAuthMethod,
    /// The service is not ready to serve requests.
    #[error("service unavailable")]
    ServiceUnavailable,
    /// The operation needs a private key the account does not hold.
    #[error("private key required")]
    PrivateKeyRequired,

    /// No candidate account matches any principal key.
    #[error("no matching principal key for any candidate account")]
    NoMatchingKey,
    /// Symmetric or asymmetric decryption failed.
    #[error("decryption failed")]
    DecryptionFailed,
    /// Plaintext access was disabled for this container.
    #[error("plaintext access disabled")]
    PlaintextDisabled,
    /// Revoking the last principal would orphan the container.
    #[error("cannot revoke the last principal")]
    CannotRevokeLast,
    /// The container is not encrypted.
    #[error("container is not encrypted")]
    NotEncrypted,
    /// The account carries no encryption key.
    #[error("account has no encryption capability")]
    NoEncryption,
    /// The container bytes are not a valid encoding.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// An upstream reply was structurally invalid.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Invariant violation; details stay server-side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidPath(_) => "INVALID_PATH",
            Error::InvalidTag(_) => "INVALID_TAG",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            Error::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Error::AccountRequired => "ACCOUNT_REQUIRED",
            Error::SignerRequired => "SIGNER_REQUIRED",
            Error::SignatureInvalid => "SIGNATURE_INVALID",
            Error::SignatureExpired => "SIGNATURE_EXPIRED",
            Error::AccessDenied(_) => "ACCESS_DENIED",
            Error::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Error::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Error::ValidationFailed(_) => "VALIDATION_FAILED",
            Error::AnchorPrincipalRequired => "ANCHOR_PRINCIPAL_REQUIRED",
            Error::OperationNotSupported(_) => "OPERATION_NOT_SUPPORTED",
            Error::UnsupportedAuthMethod => "UNSUPPORTED_AUTH_METHOD",
            Error::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Error::PrivateKeyRequired => "PRIVATE_KEY_REQUIRED",
            Error::NoMatchingKey => "NO_MATCHING_KEY",
            Error::DecryptionFailed => "DECRYPTION_FAILED",
            Error::PlaintextDisabled => "PLAINTEXT_DISABLED",
            Error::CannotRevokeLast => "CANNOT_REVOKE_LAST",
            Error::NotEncrypted => "NOT_ENCRYPTED",
            Error::NoEncryption => "NO_ENCRYPTION",
            Error::MalformedContainer(_) => "MALFORMED_CONTAINER",
            Error::InvalidResponse(_) => "INVALID_RESPONSE",
            Error::Internal(_) => "INTERNAL",
        }
    }

    /// Canonical HTTP status when surfaced at the wire.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidPath(_)
            | Error::InvalidTag(_)
            | Error::InvalidArgument(_)
            | Error::UnsupportedVersion(_)
            | Error::SchemaMismatch(_)
            | Error::AnchorPrincipalRequired
            | Error::NoMatchingKey
            | Error::DecryptionFailed
            | Error::CannotRevokeLast
            | Error::NotEncrypted
            | Error::NoEncryption
            | Error::MalformedContainer(_) => 400,
            Error::AccountRequired
            | Error::SignerRequired
            | Error::SignatureInvalid
            | Error::SignatureExpired
            | Error::PrivateKeyRequired => 401,
            Error::AccessDenied(_) => 403,
            Error::DocumentNotFound => 404,
            Error::QuotaExceeded(_) => 413,
            Error::ValidationFailed(_) => 422,
            Error::OperationNotSupported(_) | Error::UnsupportedAuthMethod => 501,
            Error::InvalidResponse(_) => 502,
            Error::ServiceUnavailable => 503,
            Error::PlaintextDisabled | Error::Internal(_) => 500,
        }
    }

    /// Serialize for the wire error body.
    pub fn to_wire(&self) -> WireError {
        let message = match self {
            // Internal details never leave the server.
            Error::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        WireError {
            ok: false,
            error: message,
            code: self.code().to_string(),
            status_code: Some(self.http_status()),
        }
    }

    /// Recover the typed variant from a wire error body.
    pub fn from_wire(wire: &WireError) -> Error {
        let detail = wire.error.clone();
        match wire.code.as_str() {
            "INVALID_PATH" => Error::InvalidPath(detail),
            "INVALID_TAG" => Error::InvalidTag(detail),
            "INVALID_ARGUMENT" => Error::InvalidArgument(detail),
            "UNSUPPORTED_VERSION" => Error::UnsupportedVersion(0),
            "SCHEMA_MISMATCH" => Error::SchemaMismatch(detail),
            "ACCOUNT_REQUIRED" => Error::AccountRequired,
            "SIGNER_REQUIRED" => Error::SignerRequired,
            "SIGNATURE_INVALID" => Error::SignatureInvalid,
            "SIGNATURE_EXPIRED" => Error::SignatureExpired,
            "ACCESS_DENIED" => Error::AccessDenied(detail),
            "DOCUMENT_NOT_FOUND" => Error::DocumentNotFound,
            "QUOTA_EXCEEDED" => Error::QuotaExceeded(detail),
            "VALIDATION_FAILED" => Error::ValidationFailed(detail),
            "ANCHOR_PRINCIPAL_REQUIRED" => Error::AnchorPrincipalRequired,
            "OPERATION_NOT_SUPPORTED" => Error::OperationNotSupported(detail),
            "UNSUPPORTED_AUTH_METHOD" => Error::UnsupportedAuthMethod,
            "SERVICE_UNAVAILABLE" => Error::ServiceUnavailable,
            "PRIVATE_KEY_REQUIRED" => Error::PrivateKeyRequired,
            "NO_MATCHING_KEY" => Error::NoMatchingKey,
            "DECRYPTION_FAILED" => Error::DecryptionFailed,
            "PLAINTEXT_DISABLED" => Error::PlaintextDisabled,
            "CANNOT_REVOKE_LAST" => Error::CannotRevokeLast,
            "NOT_ENCRYPTED" => Error::NotEncrypted,
            "NO_ENCRYPTION" => Error::NoEncryption,
            "MALFORMED_CONTAINER" => Error::MalformedContainer(detail),
            "INVALID_RESPONSE" => Error::InvalidResponse(detail),
            _ => Error::Internal(detail),
        }
    }
}

impl From<Asn1Error> for Error {
    fn from(e: Asn1Error) -> Self {
        Error::MalformedContainer(e.to_string())
    }
}

/// JSON error body shared by server and client.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireError {
    /// Always false for errors.
    pub ok: bool,
    /// Human-readable message.
    pub error: String,
    /// Stable error code.
    #[serde(default)]
    pub code: String,
    /// HTTP status the server chose, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}
