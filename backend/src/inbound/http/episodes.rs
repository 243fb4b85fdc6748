//! Episode action HTTP handlers.
//!
//! ```text
//! GET  /api/2/episodes/{user}?podcast=&device=&since=&aggregated=
//! POST /api/2/episodes/{user}
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{
    EpisodeActionsRequest, EpisodeActionsResponse, UploadEpisodeActionsRequest,
};
use crate::domain::{EpisodeAction, EpisodeActionSubmission};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::subscriptions::{UploadResponse, rewrite_pairs};
use crate::inbound::http::validation::{
    FieldName, parse_optional_device_uid, parse_optional_epoch_seconds,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Filters for the episode journal.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EpisodeQuery {
    /// Only actions for this podcast feed URL.
    pub podcast: Option<String>,
    /// Only actions reported by this device.
    pub device: Option<String>,
    /// Only actions newer than this watermark (seconds since the epoch).
    pub since: Option<i64>,
    /// Keep only the newest action per episode.
    #[serde(default)]
    pub aggregated: bool,
}

/// One episode action as exchanged with clients.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct EpisodeActionPayload {
    pub podcast: String,
    pub episode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[schema(example = "play")]
    pub action: String,
    /// ISO-8601, UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "2024-01-01T10:00:00")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl From<EpisodeActionPayload> for EpisodeActionSubmission {
    fn from(value: EpisodeActionPayload) -> Self {
        Self {
            podcast: value.podcast,
            episode: value.episode,
            device: value.device,
            action: value.action,
            timestamp: value.timestamp,
            started: value.started,
            position: value.position,
            total: value.total,
        }
    }
}

impl From<EpisodeAction> for EpisodeActionPayload {
    fn from(value: EpisodeAction) -> Self {
        Self {
            podcast: value.episode.podcast.url.into(),
            episode: value.episode.url.into(),
            device: value.device.map(String::from),
            action: value.kind.to_string(),
            timestamp: Some(value.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            started: value.playback.started.map(i64::from),
            position: value.playback.position.map(i64::from),
            total: value.playback.total.map(i64::from),
        }
    }
}

/// Journal entries plus the watermark for the next query.
#[derive(Debug, Serialize, ToSchema)]
pub struct EpisodeActionsBody {
    pub actions: Vec<EpisodeActionPayload>,
    /// Seconds since the epoch; pass back as `since` next time.
    pub timestamp: i64,
}

impl From<EpisodeActionsResponse> for EpisodeActionsBody {
    fn from(value: EpisodeActionsResponse) -> Self {
        Self {
            actions: value
                .actions
                .into_iter()
                .map(EpisodeActionPayload::from)
                .collect(),
            timestamp: value.timestamp.timestamp(),
        }
    }
}

/// List the user's episode actions.
#[utoipa::path(
    get,
    path = "/api/2/episodes/{user}",
    params(
        ("user" = String, Path, description = "Owning user id"),
        EpisodeQuery
    ),
    responses(
        (status = 200, description = "Episode actions, oldest first", body = EpisodeActionsBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["episodes"],
    operation_id = "listEpisodeActions"
)]
#[get("/episodes/{user}")]
pub async fn list_episode_actions(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    query: web::Query<EpisodeQuery>,
) -> ApiResult<web::Json<EpisodeActionsBody>> {
    let user_id = session.require_owner(&path.into_inner())?;
    let EpisodeQuery {
        podcast,
        device,
        since,
        aggregated,
    } = query.into_inner();
    let device = parse_optional_device_uid(device.as_deref(), FieldName::new("device"))?;
    let since = parse_optional_epoch_seconds(since, FieldName::new("since"))?;

    let response = state
        .episodes_query
        .list(EpisodeActionsRequest {
            user_id,
            podcast,
            device,
            since,
            aggregated,
        })
        .await?;
    Ok(web::Json(EpisodeActionsBody::from(response)))
}

/// Upload a batch of episode actions.
#[utoipa::path(
    post,
    path = "/api/2/episodes/{user}",
    params(("user" = String, Path, description = "Owning user id")),
    request_body = Vec<EpisodeActionPayload>,
    responses(
        (status = 200, description = "Actions recorded", body = UploadResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["episodes"],
    operation_id = "uploadEpisodeActions"
)]
#[post("/episodes/{user}")]
pub async fn upload_episode_actions(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<Vec<EpisodeActionPayload>>,
) -> ApiResult<web::Json<UploadResponse>> {
    let user_id = session.require_owner(&path.into_inner())?;
    let actions = payload
        .into_inner()
        .into_iter()
        .map(EpisodeActionSubmission::from)
        .collect();

    let response = state
        .episodes
        .upload(UploadEpisodeActionsRequest { user_id, actions })
        .await?;
    Ok(web::Json(UploadResponse {
        timestamp: response.timestamp.timestamp(),
        update_urls: rewrite_pairs(response.update_urls),
    }))
}
