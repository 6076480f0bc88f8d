//! Record HTTP Routes
//!
//! - `/api/v1`: current-state API (`Record` bodies)
//! - `/api/v2`: versioned API (`RecordVersion` bodies, history, `?at=`)
//!
//! `POST /records/:id` is create-or-update in both versions. Bodies are
//! parsed by hand so malformed JSON is a 400 like every other bad input.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::errors::{ApiError, ApiResult};
use crate::service::{
    Record, RecordResult, RecordVersion, RecordVersions, RequestContext, Updates,
    VersionedRecordService,
};

// ==================
// Shared State
// ==================

/// State shared by the record handlers.
pub struct RecordsState<S> {
    pub service: Arc<S>,
    pub request_timeout: Duration,
}

impl<S> RecordsState<S> {
    pub fn new(service: Arc<S>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    fn context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}

impl<S> Clone for RecordsState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            request_timeout: self.request_timeout,
        }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct AtQuery {
    #[serde(default)]
    pub at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ==================
// Routes
// ==================

pub fn v1_routes<S: VersionedRecordService + 'static>(state: RecordsState<S>) -> Router {
    Router::new()
        .route("/health", get(v1_health_handler).post(v1_health_handler))
        .route(
            "/records/:id",
            get(get_record_handler::<S>).post(post_record_handler::<S>),
        )
        .with_state(state)
}

pub fn v2_routes<S: VersionedRecordService + 'static>(state: RecordsState<S>) -> Router {
    Router::new()
        .route(
            "/records/:id",
            get(get_record_version_handler::<S>).post(post_record_version_handler::<S>),
        )
        .route("/records/:id/versions", get(list_versions_handler::<S>))
        .route(
            "/records/:id/versions/:version",
            get(get_exact_version_handler::<S>),
        )
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

/// Awaits a facade call, cancelling `ctx` if the handler is dropped first.
async fn guarded<T, F>(ctx: &RequestContext, call: F) -> ApiResult<T>
where
    F: Future<Output = RecordResult<T>>,
{
    let guard = ctx.cancel_on_drop();
    let result = call.await;
    guard.disarm();
    Ok(result?)
}

/// Non-numeric ids are rejected here; range checks belong to the engine.
fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError::InvalidId)
}

fn parse_version(raw: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError::InvalidVersion)
}

/// RFC3339 to milliseconds since the epoch.
fn parse_at(raw: &str) -> ApiResult<i64> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.timestamp_millis())
        .map_err(|e| ApiError::InvalidTimestamp(e.to_string()))
}

fn parse_updates(body: &[u8]) -> ApiResult<Updates> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

// ==================
// v1 Handlers
// ==================

async fn v1_health_handler() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

async fn get_record_handler<S: VersionedRecordService>(
    State(state): State<RecordsState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Record>> {
    let id = parse_id(&id)?;
    let ctx = state.context();
    let record = guarded(&ctx, state.service.get_record(&ctx, id)).await?;
    Ok(Json(record))
}

async fn post_record_handler<S: VersionedRecordService>(
    State(state): State<RecordsState<S>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Record>> {
    let id = parse_id(&id)?;
    let updates = parse_updates(&body)?;
    let ctx = state.context();
    let version = guarded(&ctx, state.service.create_or_update_record(&ctx, id, updates)).await?;
    Ok(Json(version.into_record()))
}

// ==================
// v2 Handlers
// ==================

async fn get_record_version_handler<S: VersionedRecordService>(
    State(state): State<RecordsState<S>>,
    Path(id): Path<String>,
    Query(query): Query<AtQuery>,
) -> ApiResult<Json<RecordVersion>> {
    let id = parse_id(&id)?;
    let at = match query.at.as_deref() {
        Some(raw) if !raw.is_empty() => Some(parse_at(raw)?),
        _ => None,
    };

    let ctx = state.context();
    let version = match at {
        Some(timestamp_ms) => {
            guarded(&ctx, state.service.get_record_version_at(&ctx, id, timestamp_ms)).await?
        }
        None => guarded(&ctx, state.service.get_latest_record_version(&ctx, id)).await?,
    };
    Ok(Json(version))
}

async fn post_record_version_handler<S: VersionedRecordService>(
    State(state): State<RecordsState<S>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<RecordVersion>> {
    let id = parse_id(&id)?;
    let updates = parse_updates(&body)?;
    let ctx = state.context();
    let version = guarded(&ctx, state.service.create_or_update_record(&ctx, id, updates)).await?;
    Ok(Json(version))
}

async fn list_versions_handler<S: VersionedRecordService>(
    State(state): State<RecordsState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordVersions>> {
    let id = parse_id(&id)?;
    let ctx = state.context();
    let versions = guarded(&ctx, state.service.list_versions(&ctx, id)).await?;
    Ok(Json(versions))
}

async fn get_exact_version_handler<S: VersionedRecordService>(
    State(state): State<RecordsState<S>>,
    Path((id, version)): Path<(String, String)>,
) -> ApiResult<Json<RecordVersion>> {
    let id = parse_id(&id)?;
    let version = parse_version(&version)?;
    let ctx = state.context();
    let found = guarded(&ctx, state.service.get_record_version(&ctx, id, version)).await?;
    Ok(Json(found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_at_accepts_offsets_and_fractions() {
        assert_eq!(parse_at("1970-01-01T00:00:01Z").unwrap(), 1_000);
        assert_eq!(parse_at("1970-01-01T01:00:00.5+01:00").unwrap(), 500);
        assert!(parse_at("yesterday").is_err());
    }

    #[test]
    fn test_parse_updates_accepts_nulls() {
        let updates = parse_updates(br#"{"a":"1","b":null}"#).unwrap();
        assert_eq!(updates.get("a"), Some(&Some("1".to_string())));
        assert_eq!(updates.get("b"), Some(&None));
    }

    #[test]
    fn test_parse_updates_rejects_non_strings() {
        assert!(parse_updates(br#"{"a":1}"#).is_err());
        assert!(parse_updates(b"[1,2]").is_err());
        assert!(parse_updates(b"").is_err());
    }

    #[test]
    fn test_parse_id_rejects_text() {
        assert!(matches!(parse_id("abc"), Err(ApiError::InvalidId)));
        assert_eq!(parse_id("-3").unwrap(), -3);
    }
}
