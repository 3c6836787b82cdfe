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

// HTTP route handlers. Every thrown protocol error maps onto the JSON body
// `{ok:false, error, code, statusCode}` through `ApiError`.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use prometheus::TextEncoder;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::core::account::Account;
use crate::core::container::Container;
use crate::core::errors::Error;
use crate::core::path::{assert_path_access, resolve, validate_segments, Operation, PathPolicy};
use crate::core::signing::{
    object_signable, public_url_signable, put_signable, quota_signable, search_signable,
    HttpSignedField,
};
use crate::core::types::{ObjectPayload, Pagination, QuotaStatus, SearchCriteria, Visibility};
use crate::server::auth;
use crate::server::config::UPLOAD_RESERVATION_TTL_MS;
use crate::server::SharedState;
use crate::storage::{PutOptions, ReserveOptions};

/// Protocol error as an HTTP response.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_wire())).into_response()
    }
}

fn full_path(captured: &str) -> String {
    format!("/{captured}")
}

fn parse_tags(query: &HashMap<String, String>) -> Vec<String> {
    query
        .get("tags")
        .map(|raw| {
            raw.split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) async fn put_object(
    State(state): State<SharedState>,
    Path(captured): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = full_path(&captured);
    let visibility = match query.get("visibility") {
        Some(raw) => Visibility::parse(raw)?,
        None => Visibility::Private,
    };
    let tags = parse_tags(&query);

    let signable = put_signable(&path, visibility.as_str(), &tags);
    let account = auth::authenticate_url(&query, &signable)?;
    let parsed = assert_path_access(
        &state.config.path_policies,
        &account.public_key_string(),
        &path,
        Operation::Put,
    )?;

    if body.len() as u64 > state.config.quotas.max_object_size {
        state.metrics.quota_rejected_total.inc();
        return Err(Error::QuotaExceeded(format!(
            "object exceeds the {} byte limit",
            state.config.quotas.max_object_size
        ))
        .into());
    }
    state.config.tag_validation.check(&tags)?;

    let needs_validation = state.config.validators.iter().any(|v| v.applies(&path));
    if visibility == Visibility::Public || needs_validation {
        let payload = decrypt_payload(&state.config.anchor_account, &body)?;
        for validator in &state.config.validators {
            if validator.applies(&path) {
                validator
                    .validate(&path, &payload.data, &payload.mime_type)
                    .map_err(Error::ValidationFailed)?;
            }
        }
    }

    // For the stored-object gauges; racing writers only skew metrics.
    let previous_size = state
        .config
        .backend
        .get(&path)
        .await?
        .map(|e| e.metadata.size);

    let reservation = state
        .config
        .backend
        .reserve_upload(
            &parsed.owner,
            &path,
            body.len() as i64,
            ReserveOptions {
                ttl_ms: UPLOAD_RESERVATION_TTL_MS,
                quota_limits: Some(state.config.quotas),
            },
        )
        .await
        .map_err(|e| {
            if matches!(e, Error::QuotaExceeded(_)) {
                state.metrics.quota_rejected_total.inc();
            }
            e
        })?;

    let put_result = state
        .config
        .backend
        .put(
            &path,
            &body,
            PutOptions {
                owner: parsed.owner.clone(),
                tags,
                visibility,
            },
        )
        .await;

    match put_result {
        Ok(object) => {
            state.config.backend.commit_upload(&reservation.id).await?;
            state.metrics.objects_put_total.inc();
            if previous_size.is_none() {
                state.metrics.objects_stored.inc();
            }
            state
                .metrics
                .bytes_stored
                .add(object.size as i64 - previous_size.unwrap_or(0) as i64);
            debug!(path = %path, size = body.len(), "object stored");
            Ok(Json(json!({ "ok": true, "object": object })))
        }
        Err(e) => {
            if let Err(release_err) = state.config.backend.release_upload(&reservation.id).await {
                warn!(?release_err, "failed to release reservation after put error");
            }
            Err(e.into())
        }
    }
}

pub(crate) async fn get_object(
    State(state): State<SharedState>,
    Path(captured): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let path = full_path(&captured);
    let account = auth::authenticate_url(&query, &object_signable("GET", &path))?;
    assert_path_access(
        &state.config.path_policies,
        &account.public_key_string(),
        &path,
        Operation::Get,
    )?;

    let entry = state
        .config
        .backend
        .get(&path)
        .await?
        .ok_or(Error::DocumentNotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        entry.data,
    )
        .into_response())
}

pub(crate) async fn delete_object(
    State(state): State<SharedState>,
    Path(captured): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = full_path(&captured);
    let account = auth::authenticate_url(&query, &object_signable("DELETE", &path))?;
    assert_path_access(
        &state.config.path_policies,
        &account.public_key_string(),
        &path,
        Operation::Delete,
    )?;

    let removed_size = state
        .config
        .backend
        .get(&path)
        .await?
        .map(|e| e.metadata.size);
    let deleted = state.config.backend.delete(&path).await?;
    if deleted {
        state.metrics.objects_deleted_total.inc();
        state.metrics.objects_stored.dec();
        state
            .metrics
            .bytes_stored
            .sub(removed_size.unwrap_or(0) as i64);
    }
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

pub(crate) async fn get_metadata(
    State(state): State<SharedState>,
    Path(captured): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = full_path(&captured);
    let account = auth::authenticate_url(&query, &object_signable("METADATA", &path))?;
    assert_path_access(
        &state.config.path_policies,
        &account.public_key_string(),
        &path,
        Operation::Metadata,
    )?;

    let entry = state
        .config
        .backend
        .get(&path)
        .await?
        .ok_or(Error::DocumentNotFound)?;
    Ok(Json(json!({ "ok": true, "object": entry.metadata })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchRequest {
    criteria: SearchCriteria,
    #[serde(default)]
    pagination: Pagination,
    account: String,
    signed: HttpSignedField,
}

pub(crate) async fn search(
    State(state): State<SharedState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let criteria_json = serde_json::to_string(&request.criteria)
        .map_err(|e| Error::Internal(format!("criteria encode: {e}")))?;
    let account = Account::from_public_key_string(&request.account)
        .map_err(|_| Error::SignatureInvalid)?;
    auth::verify_or_reject(
        &account,
        &search_signable(&criteria_json),
        &request.signed,
        crate::core::signing::DEFAULT_MAX_SKEW_MS,
    )?;

    // Cross-owner queries are only allowed over public objects; everything
    // else is forced into the authenticated account's scope.
    let mut criteria = request.criteria.clone();
    if criteria.visibility != Some(Visibility::Public) {
        criteria.owner = Some(account.public_key_string());
    }

    let mut page = request.pagination.clone();
    let max = state.config.quotas.max_search_limit;
    page.limit = Some(page.limit.unwrap_or(max).min(max));

    let results = state.config.backend.search(&criteria, &page).await?;
    Ok(Json(json!({
        "ok": true,
        "results": results.results,
        "nextCursor": results.next_cursor,
    })))
}

pub(crate) async fn quota(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = auth::authenticate_url(&query, &quota_signable())?;
    let status = state
        .config
        .backend
        .quota_status(&account.public_key_string())
        .await?;

    // The server's configured limits are authoritative at the protocol edge;
    // the backend's own limits may diverge.
    let quotas = state.config.quotas;
    let quota = QuotaStatus {
        object_count: status.object_count,
        total_size: status.total_size,
        remaining_objects: quotas.max_objects_per_user.saturating_sub(status.object_count),
        remaining_size: quotas.max_storage_per_user.saturating_sub(status.total_size),
    };
    Ok(Json(json!({ "ok": true, "quota": quota })))
}

pub(crate) async fn get_public(
    State(state): State<SharedState>,
    Path(captured): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let path = full_path(&captured);

    let expires_raw = query
        .get("expires")
        .ok_or_else(|| Error::InvalidArgument("expires parameter required".into()))?;
    let expires: i64 = expires_raw
        .parse()
        .map_err(|_| Error::InvalidArgument("expires must be numeric".into()))?;
    let now = Utc::now().timestamp();
    if expires <= now {
        return Err(Error::SignatureExpired.into());
    }
    let max_ttl = state.config.quotas.max_signed_url_ttl as i64;
    if expires > now + max_ttl {
        return Err(Error::InvalidArgument(
            "expires exceeds the maximum signed-url ttl".into(),
        )
        .into());
    }

    let (policy, parsed) = resolve(&state.config.path_policies, &path)
        .ok_or_else(|| Error::InvalidPath("no policy matches".into()))?;
    validate_segments(&path)?;

    let signer_key = match policy.authorized_signer(&parsed) {
        Some(key) => key,
        None => query.get("account").cloned().ok_or(Error::SignerRequired)?,
    };
    let signer =
        Account::from_public_key_string(&signer_key).map_err(|_| Error::SignatureInvalid)?;

    let field = public_signed_field(&query)?;
    // The whole validity window is honored: skew equals the maximum TTL.
    auth::verify_or_reject(
        &signer,
        &public_url_signable(&path, expires),
        &field,
        max_ttl.saturating_mul(1000),
    )?;

    let entry = state
        .config
        .backend
        .get(&path)
        .await?
        .ok_or(Error::DocumentNotFound)?;
    if entry.metadata.visibility != Visibility::Public {
        // Pre-signed links never reveal whether a private object exists.
        return Err(Error::DocumentNotFound.into());
    }

    let payload = decrypt_stored_payload(&state.config.anchor_account, &entry.data)?;
    state.metrics.public_fetch_total.inc();

    let mime = HeaderValue::from_str(&payload.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let mut response = (StatusCode::OK, payload.data).into_response();
    response.headers_mut().insert(header::CONTENT_TYPE, mime);
    if let Some(origin) = &state.config.public_cors_origin {
        if let Ok(value) = HeaderValue::from_str(origin) {
            response
                .headers_mut()
                .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
    Ok(response)
}

pub(crate) async fn metrics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let families = state.metrics.registry.gather();
    let body = TextEncoder::new()
        .encode_to_string(&families)
        .map_err(|_| Error::Internal("metrics encode".into()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

pub(crate) async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Signed-field parameters on public URLs are flat (`nonce`, `timestamp`,
/// `signature`), unlike the `signed.`-prefixed authenticated routes.
fn public_signed_field(query: &HashMap<String, String>) -> Result<HttpSignedField, Error> {
    let nonce = query.get("nonce").ok_or(Error::SignatureInvalid)?;
    let timestamp = query.get("timestamp").ok_or(Error::SignatureInvalid)?;
    let signature = query.get("signature").ok_or(Error::SignatureInvalid)?;
    Ok(HttpSignedField {
        nonce: nonce.clone(),
        timestamp: timestamp.clone(),
        signature: signature.clone(),
    })
}

/// Decrypt an uploaded container with the anchor account and parse the
/// payload. Containers the anchor cannot open are a principal-set fault.
fn decrypt_payload(anchor: &Account, body: &[u8]) -> Result<ObjectPayload, Error> {
    let container =
        Container::from_encrypted(body, std::slice::from_ref(anchor)).map_err(|e| match e {
            Error::NotEncrypted => Error::AnchorPrincipalRequired,
            other => other,
        })?;
    let plaintext = container.plaintext().map_err(|e| match e {
        Error::NoMatchingKey => Error::AnchorPrincipalRequired,
        other => other,
    })?;
    ObjectPayload::from_bytes(&plaintext)
        .map_err(|_| Error::ValidationFailed("object payload is not parseable".into()))
}

/// Same as [`decrypt_payload`] but for objects already admitted to storage,
/// where an unreadable container is an internal invariant violation.
fn decrypt_stored_payload(anchor: &Account, data: &[u8]) -> Result<ObjectPayload, Error> {
    let container = Container::from_encrypted(data, std::slice::from_ref(anchor))
        .map_err(|e| Error::Internal(format!("stored container unreadable: {e}")))?;
    let plaintext = container
        .plaintext()
        .map_err(|e| Error::Internal(format!("stored container undecryptable: {e}")))?;
    ObjectPayload::from_bytes(&plaintext)
        .map_err(|e| Error::Internal(format!("stored payload unparseable: {e}")))
}
