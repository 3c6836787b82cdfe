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

//! Typed anchor client.
//!
//! Mirrors the server surface one-to-one. Containers are built client-side:
//! the plaintext payload is encrypted to the owning account (plus the anchor
//! account for public objects) before any byte leaves the process. Wire
//! errors are recovered into the typed taxonomy; a `DocumentNotFound` on get
//! becomes `Ok(None)`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::core::account::Account;
use crate::core::container::{Container, ContainerOptions};
use crate::core::errors::{Error, WireError};
use crate::core::signing::{
    object_signable, public_url_signable, put_signable, quota_signable, search_signable, sign_data,
};
use crate::core::types::{
    ObjectPayload, Pagination, QuotaStatus, SearchCriteria, SearchResults, StorageObject,
    Visibility,
};
use crate::server::config::DEFAULT_SIGNED_URL_TTL;

/// Endpoint resolution.
pub mod resolver;

pub use resolver::Resolver;

/// A put request.
#[derive(Clone, Debug)]
pub struct PutRequest {
    /// Object path.
    pub path: String,
    /// Plaintext content bytes.
    pub data: Vec<u8>,
    /// MIME type stored alongside the content.
    pub mime_type: String,
    /// Metadata tags.
    pub tags: Vec<String>,
    /// Visibility flag.
    pub visibility: Visibility,
    /// Owning account; falls back to the client default.
    pub account: Option<Account>,
    /// Anchor account to co-encrypt public objects to; falls back to the
    /// client's configured anchor.
    pub anchor_account: Option<Account>,
}

impl PutRequest {
    /// A private put of `data` under `path`.
    pub fn new(path: impl Into<String>, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data,
            mime_type: mime_type.into(),
            tags: Vec::new(),
            visibility: Visibility::Private,
            account: None,
            anchor_account: None,
        }
    }
}

/// Decrypted object content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectContent {
    /// Content bytes.
    pub data: Vec<u8>,
    /// MIME type embedded in the payload.
    pub mime_type: String,
}

/// A pre-signed public URL request.
#[derive(Clone, Debug)]
pub struct PublicUrlRequest {
    /// Object path.
    pub path: String,
    /// Validity in seconds; the server default when absent.
    pub ttl_secs: Option<i64>,
    /// Signing account; falls back to the client default. Supplying it
    /// explicitly also names the signer in the URL, which paths whose
    /// policy designates no authorized signer require.
    pub account: Option<Account>,
}

/// Typed client for one anchor service.
pub struct AnchorClient {
    http: reqwest::Client,
    resolver: Resolver,
    default_account: Option<Account>,
    anchor_account: Option<Account>,
}

impl AnchorClient {
    /// Client against the resolved endpoint.
    pub fn new(resolver: Resolver) -> Self {
        Self {
            http: reqwest::Client::new(),
            resolver,
            default_account: None,
            anchor_account: None,
        }
    }

    /// Set the account used when a request names none.
    pub fn with_default_account(mut self, account: Account) -> Self {
        self.default_account = Some(account);
        self
    }

    /// Remember the anchor's public account for public puts.
    pub fn with_anchor_account(mut self, account: Account) -> Self {
        self.anchor_account = Some(account);
        self
    }

    fn account(&self, given: Option<Account>) -> Result<Account, Error> {
        given
            .or_else(|| self.default_account.clone())
            .ok_or(Error::AccountRequired)
    }

    fn object_url(&self, route: &str, path: &str) -> String {
        format!("{}{}{}", self.resolver.endpoint(), route, path)
    }

    /// Encrypt and upload an object.
    pub async fn put(&self, request: PutRequest) -> Result<StorageObject, Error> {
        let account = self.account(request.account)?;
        let payload = ObjectPayload {
            mime_type: request.mime_type,
            data: request.data,
        }
        .to_bytes()?;

        let mut principals = vec![account.clone()];
        if request.visibility == Visibility::Public {
            let anchor = request
                .anchor_account
                .or_else(|| self.anchor_account.clone())
                .ok_or(Error::AnchorPrincipalRequired)?;
            principals.push(anchor);
        }
        let container = Container::from_plaintext(&payload, &principals, ContainerOptions::default())?;
        let body = container.encode()?;

        let signable = put_signable(&request.path, request.visibility.as_str(), &request.tags);
        let signed = sign_data(&account, &signable)?;

        let mut params = vec![
            ("account".to_string(), account.public_key_string()),
            ("signed.nonce".to_string(), signed.nonce),
            ("signed.timestamp".to_string(), signed.timestamp),
            ("signed.signature".to_string(), signed.signature),
            ("visibility".to_string(), request.visibility.to_string()),
        ];
        if !request.tags.is_empty() {
            params.push(("tags".to_string(), request.tags.join(",")));
        }

        let response = self
            .http
            .put(self.object_url("/api/object", &request.path))
            .query(&params)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        #[derive(Deserialize)]
        struct PutResponse {
            ok: bool,
            object: StorageObject,
        }
        let parsed: PutResponse = expect_json(response).await?;
        if !parsed.ok {
            return Err(Error::InvalidResponse("server reported failure".into()));
        }
        Ok(parsed.object)
    }

    /// Fetch and decrypt an object; `Ok(None)` when the path does not exist.
    pub async fn get(
        &self,
        path: &str,
        account: Option<Account>,
    ) -> Result<Option<ObjectContent>, Error> {
        let account = self.account(account)?;
        let signed = sign_data(&account, &object_signable("GET", path))?;
        let response = self
            .http
            .get(self.object_url("/api/object", path))
            .query(&signed_params(&account, &signed))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return match error_from(response).await {
                Error::DocumentNotFound => Ok(None),
                other => Err(other),
            };
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::InvalidResponse(format!("body read: {e}")))?;
        let container = Container::from_encoded(&bytes, std::slice::from_ref(&account))?;
        let plaintext = container.plaintext()?;
        let payload = ObjectPayload::from_bytes(&plaintext)?;
        Ok(Some(ObjectContent {
            data: payload.data,
            mime_type: payload.mime_type,
        }))
    }

    /// Fetch object metadata.
    pub async fn get_metadata(
        &self,
        path: &str,
        account: Option<Account>,
    ) -> Result<StorageObject, Error> {
        let account = self.account(account)?;
        let signed = sign_data(&account, &object_signable("METADATA", path))?;
        let response = self
            .http
            .get(self.object_url("/api/metadata", path))
            .query(&signed_params(&account, &signed))
            .send()
            .await
            .map_err(transport_error)?;

        #[derive(Deserialize)]
        struct MetadataResponse {
            #[allow(dead_code)]
            ok: bool,
            object: StorageObject,
        }
        let parsed: MetadataResponse = expect_json(response).await?;
        Ok(parsed.object)
    }

    /// Delete an object; `true` iff something was removed.
    pub async fn delete(&self, path: &str, account: Option<Account>) -> Result<bool, Error> {
        let account = self.account(account)?;
        let signed = sign_data(&account, &object_signable("DELETE", path))?;
        let response = self
            .http
            .delete(self.object_url("/api/object", path))
            .query(&signed_params(&account, &signed))
            .send()
            .await
            .map_err(transport_error)?;

        #[derive(Deserialize)]
        struct DeleteResponse {
            #[allow(dead_code)]
            ok: bool,
            deleted: bool,
        }
        let parsed: DeleteResponse = expect_json(response).await?;
        Ok(parsed.deleted)
    }

    /// Query object metadata.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        pagination: &Pagination,
        account: Option<Account>,
    ) -> Result<SearchResults, Error> {
        let account = self.account(account)?;
        let criteria_json = serde_json::to_string(criteria)
            .map_err(|e| Error::Internal(format!("criteria encode: {e}")))?;
        let signed = sign_data(&account, &search_signable(&criteria_json))?;

        let body = json!({
            "criteria": criteria,
            "pagination": pagination,
            "account": account.public_key_string(),
            "signed": signed,
        });
        let response = self
            .http
            .post(format!("{}/api/search", self.resolver.endpoint()))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SearchResponse {
            #[allow(dead_code)]
            ok: bool,
            results: Vec<StorageObject>,
            #[serde(default)]
            next_cursor: Option<String>,
        }
        let parsed: SearchResponse = expect_json(response).await?;
        Ok(SearchResults {
            results: parsed.results,
            next_cursor: parsed.next_cursor,
        })
    }

    /// Quota usage for the account.
    pub async fn quota_status(&self, account: Option<Account>) -> Result<QuotaStatus, Error> {
        let account = self.account(account)?;
        let signed = sign_data(&account, &quota_signable())?;
        let response = self
            .http
            .get(format!("{}/api/quota", self.resolver.endpoint()))
            .query(&signed_params(&account, &signed))
            .send()
            .await
            .map_err(transport_error)?;

        #[derive(Deserialize)]
        struct QuotaResponse {
            #[allow(dead_code)]
            ok: bool,
            quota: QuotaStatus,
        }
        let parsed: QuotaResponse = expect_json(response).await?;
        Ok(parsed.quota)
    }

    /// Pre-sign a public URL for a stored public object.
    pub fn public_url(&self, request: PublicUrlRequest) -> Result<String, Error> {
        let explicit_signer = request.account.is_some();
        let account = self.account(request.account)?;
        let ttl = request
            .ttl_secs
            .unwrap_or(DEFAULT_SIGNED_URL_TTL as i64);
        let expires = Utc::now().timestamp() + ttl;

        let signed = sign_data(&account, &public_url_signable(&request.path, expires))?;

        let mut url = reqwest::Url::parse(&self.object_url("/api/public", &request.path))
            .map_err(|e| Error::InvalidArgument(format!("bad public url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("nonce", &signed.nonce)
            .append_pair("timestamp", &signed.timestamp)
            .append_pair("signature", &signed.signature);
        // Paths under a policy that designates its own signer ignore the
        // account parameter; only attach it when the caller named one.
        if explicit_signer {
            url.query_pairs_mut()
                .append_pair("account", &account.public_key_string());
        }
        Ok(url.to_string())
    }
}

fn signed_params(
    account: &Account,
    signed: &crate::core::signing::HttpSignedField,
) -> Vec<(String, String)> {
    vec![
        ("account".to_string(), account.public_key_string()),
        ("signed.nonce".to_string(), signed.nonce.clone()),
        ("signed.timestamp".to_string(), signed.timestamp.clone()),
        ("signed.signature".to_string(), signed.signature.clone()),
    ]
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::InvalidResponse(format!("transport: {e}"))
}

async fn error_from(response: reqwest::Response) -> Error {
    let status = response.status();
    match response.json::<WireError>().await {
        Ok(wire) => Error::from_wire(&wire),
        Err(_) => Error::InvalidResponse(format!("unexpected status {status}")),
    }
}

async fn expect_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, Error> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("body decode: {e}")))
}
