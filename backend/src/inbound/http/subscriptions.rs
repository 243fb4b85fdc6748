//! Subscription delta HTTP handlers.
//!
//! ```text
//! GET  /api/2/subscriptions/{user}/{device}?since=
//! POST /api/2/subscriptions/{user}/{device}
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{
    ApplySubscriptionChangesRequest, ApplySubscriptionChangesResponse,
    SubscriptionChangesRequest,
};
use crate::domain::{SubscriptionChanges, UrlRewrite};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_device_uid, parse_since};

/// Query string for the delta read.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SinceQuery {
    /// Watermark from the previous response; `0` for a full sync. Required.
    pub since: Option<i64>,
}

/// Feed URLs a device subscribed to and unsubscribed from.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct SubscriptionChangesPayload {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

/// Net subscription changes since the requested watermark.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionDeltaResponse {
    pub add: Vec<String>,
    pub remove: Vec<String>,
    /// Seconds since the epoch; pass back as `since` next time.
    pub timestamp: i64,
}

impl From<SubscriptionChanges> for SubscriptionDeltaResponse {
    fn from(value: SubscriptionChanges) -> Self {
        Self {
            add: value.add.into_iter().map(String::from).collect(),
            remove: value.remove.into_iter().map(String::from).collect(),
            timestamp: value.until.timestamp(),
        }
    }
}

/// Acknowledgement of an upload.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Seconds since the epoch at which the upload was recorded.
    pub timestamp: i64,
    /// `[original, canonical]` pairs; an empty canonical URL means the
    /// original was dropped.
    #[schema(value_type = Vec<Vec<String>>)]
    pub update_urls: Vec<(String, String)>,
}

pub(crate) fn rewrite_pairs(rewrites: Vec<UrlRewrite>) -> Vec<(String, String)> {
    rewrites
        .into_iter()
        .map(|rewrite| (rewrite.original, rewrite.canonical))
        .collect()
}

impl From<ApplySubscriptionChangesResponse> for UploadResponse {
    fn from(value: ApplySubscriptionChangesResponse) -> Self {
        Self {
            timestamp: value.timestamp.timestamp(),
            update_urls: rewrite_pairs(value.update_urls),
        }
    }
}

/// Report subscription changes for a device since a watermark.
#[utoipa::path(
    get,
    path = "/api/2/subscriptions/{user}/{device}",
    params(
        ("user" = String, Path, description = "Owning user id"),
        ("device" = String, Path, description = "Device id"),
        SinceQuery
    ),
    responses(
        (status = 200, description = "Subscription delta", body = SubscriptionDeltaResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["subscriptions"],
    operation_id = "getSubscriptionChanges"
)]
#[get("/subscriptions/{user}/{device}")]
pub async fn get_subscription_changes(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<(String, String)>,
    query: web::Query<SinceQuery>,
) -> ApiResult<web::Json<SubscriptionDeltaResponse>> {
    let (user, device) = path.into_inner();
    let user_id = session.require_owner(&user)?;
    let device = parse_device_uid(&device, FieldName::new("device"))?;
    let since = parse_since(query.since, FieldName::new("since"))?;

    let changes = state
        .subscriptions_query
        .changes(SubscriptionChangesRequest {
            user_id,
            device,
            since,
        })
        .await?;
    Ok(web::Json(SubscriptionDeltaResponse::from(changes)))
}

/// Upload subscription changes made on a device.
#[utoipa::path(
    post,
    path = "/api/2/subscriptions/{user}/{device}",
    params(
        ("user" = String, Path, description = "Owning user id"),
        ("device" = String, Path, description = "Device id; created on first upload")
    ),
    request_body = SubscriptionChangesPayload,
    responses(
        (status = 200, description = "Changes recorded", body = UploadResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["subscriptions"],
    operation_id = "uploadSubscriptionChanges"
)]
#[post("/subscriptions/{user}/{device}")]
pub async fn upload_subscription_changes(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<(String, String)>,
    payload: web::Json<SubscriptionChangesPayload>,
) -> ApiResult<web::Json<UploadResponse>> {
    let (user, device) = path.into_inner();
    let user_id = session.require_owner(&user)?;
    let device = parse_device_uid(&device, FieldName::new("device"))?;
    let SubscriptionChangesPayload { add, remove } = payload.into_inner();

    let response = state
        .subscriptions
        .apply_changes(ApplySubscriptionChangesRequest {
            user_id,
            device,
            add,
            remove,
        })
        .await?;
    Ok(web::Json(UploadResponse::from(response)))
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;
