//! Device synchronisation HTTP handlers.
//!
//! ```text
//! GET  /api/2/sync-devices/{user}
//! POST /api/2/sync-devices/{user}
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DeviceUid;
use crate::domain::ports::{SyncStatus, UpdateSyncRequest};
use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_device_uid_list};

/// Requested grouping changes.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct SyncUpdatePayload {
    /// Each list is synchronised into one group.
    #[serde(default)]
    pub synchronize: Vec<Vec<String>>,
    /// Devices to take out of their groups.
    #[serde(default, rename = "stop-synchronize")]
    pub stop_synchronize: Vec<String>,
}

/// Current grouping of the user's devices.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncStatusResponse {
    pub synchronized: Vec<Vec<String>>,
    #[serde(rename = "not-synchronized")]
    pub not_synchronized: Vec<String>,
}

fn uid_strings(uids: Vec<DeviceUid>) -> Vec<String> {
    uids.into_iter().map(String::from).collect()
}

impl From<SyncStatus> for SyncStatusResponse {
    fn from(value: SyncStatus) -> Self {
        Self {
            synchronized: value.synchronized.into_iter().map(uid_strings).collect(),
            not_synchronized: uid_strings(value.not_synchronized),
        }
    }
}

fn parse_sync_payload(payload: &SyncUpdatePayload) -> Result<ParsedSync, Error> {
    let synchronize = payload
        .synchronize
        .iter()
        .map(|list| parse_device_uid_list(list, FieldName::new("synchronize")))
        .collect::<Result<Vec<_>, _>>()?;
    let stop_synchronize =
        parse_device_uid_list(&payload.stop_synchronize, FieldName::new("stop-synchronize"))?;
    Ok(ParsedSync {
        synchronize,
        stop_synchronize,
    })
}

#[derive(Debug)]
struct ParsedSync {
    synchronize: Vec<Vec<DeviceUid>>,
    stop_synchronize: Vec<DeviceUid>,
}

/// Report which devices are synchronised together.
#[utoipa::path(
    get,
    path = "/api/2/sync-devices/{user}",
    params(("user" = String, Path, description = "Owning user id")),
    responses(
        (status = 200, description = "Sync status", body = SyncStatusResponse),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["sync"],
    operation_id = "getSyncStatus"
)]
#[get("/sync-devices/{user}")]
pub async fn get_sync_status(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<SyncStatusResponse>> {
    let user_id = session.require_owner(&path.into_inner())?;
    let status = state.sync_query.sync_status(&user_id).await?;
    Ok(web::Json(SyncStatusResponse::from(status)))
}

/// Group devices together or take them out of their groups.
#[utoipa::path(
    post,
    path = "/api/2/sync-devices/{user}",
    params(("user" = String, Path, description = "Owning user id")),
    request_body = SyncUpdatePayload,
    responses(
        (status = 200, description = "Sync status after the update", body = SyncStatusResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 404, description = "Unknown device", body = ErrorSchema),
        (status = 409, description = "Groups cannot be combined or changes kept conflicting", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["sync"],
    operation_id = "updateSync"
)]
#[post("/sync-devices/{user}")]
pub async fn update_sync(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<SyncUpdatePayload>,
) -> ApiResult<web::Json<SyncStatusResponse>> {
    let user_id = session.require_owner(&path.into_inner())?;
    let parsed = parse_sync_payload(&payload)?;

    let status = state
        .sync
        .update_sync(UpdateSyncRequest {
            user_id,
            synchronize: parsed.synchronize,
            stop_synchronize: parsed.stop_synchronize,
        })
        .await?;
    Ok(web::Json(SyncStatusResponse::from(status)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockSyncCommand, MockSyncQuery};
    use crate::inbound::http::test_utils::{TEST_USER, login_cookie, test_app};

    fn uid(raw: &str) -> DeviceUid {
        DeviceUid::new(raw).expect("uid")
    }

    fn configure(cfg: &mut web::ServiceConfig) {
        cfg.service(get_sync_status).service(update_sync);
    }

    #[rstest]
    fn parse_sync_payload_rejects_invalid_uids() {
        let payload = SyncUpdatePayload {
            synchronize: vec![vec!["phone".to_owned(), "no good".to_owned()]],
            stop_synchronize: Vec::new(),
        };

        let err = parse_sync_payload(&payload).expect_err("invalid uid");

        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        let details = err
            .details()
            .and_then(|value| value.as_object())
            .expect("details");
        assert_eq!(
            details.get("field").and_then(|v| v.as_str()),
            Some("synchronize")
        );
    }

    #[actix_web::test]
    async fn status_uses_hyphenated_keys() {
        let mut query = MockSyncQuery::new();
        query.expect_sync_status().times(1).return_once(|_| {
            Ok(SyncStatus {
                synchronized: vec![vec![uid("laptop"), uid("phone")]],
                not_synchronized: vec![uid("tablet")],
            })
        });
        let state = HttpState {
            sync_query: Arc::new(query),
            ..HttpState::fixtures()
        };
        let app = actix_test::init_service(test_app(state, configure)).await;
        let cookie = login_cookie(&app).await;

        let request = actix_test::TestRequest::get()
            .uri(&format!("/api/2/sync-devices/{TEST_USER}"))
            .cookie(cookie)
            .to_request();
        let response = actix_test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(
            body,
            json!({"synchronized": [["laptop", "phone"]], "not-synchronized": ["tablet"]})
        );
    }

    #[actix_web::test]
    async fn update_forwards_both_lists() {
        let mut command = MockSyncCommand::new();
        command
            .expect_update_sync()
            .withf(|request| {
                request.synchronize == vec![vec![uid("phone"), uid("laptop")]]
                    && request.stop_synchronize == vec![uid("tablet")]
            })
            .times(1)
            .return_once(|_| Ok(SyncStatus::default()));
        let state = HttpState {
            sync: Arc::new(command),
            ..HttpState::fixtures()
        };
        let app = actix_test::init_service(test_app(state, configure)).await;
        let cookie = login_cookie(&app).await;

        let request = actix_test::TestRequest::post()
            .uri(&format!("/api/2/sync-devices/{TEST_USER}"))
            .cookie(cookie)
            .set_json(json!({
                "synchronize": [["phone", "laptop"]],
                "stop-synchronize": ["tablet"],
            }))
            .to_request();
        let response = actix_test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn merging_populated_groups_is_a_conflict() {
        let mut command = MockSyncCommand::new();
        command.expect_update_sync().return_once(|_| {
            Err(Error::invalid_state("devices belong to different sync groups")
                .with_details(json!({"code": "cannot_merge_groups"})))
        });
        let state = HttpState {
            sync: Arc::new(command),
            ..HttpState::fixtures()
        };
        let app = actix_test::init_service(test_app(state, configure)).await;
        let cookie = login_cookie(&app).await;

        let request = actix_test::TestRequest::post()
            .uri(&format!("/api/2/sync-devices/{TEST_USER}"))
            .cookie(cookie)
            .set_json(json!({"synchronize": [["phone", "laptop"]]}))
            .to_request();
        let response = actix_test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body.get("code").and_then(Value::as_str), Some("invalid_state"));
        assert_eq!(
            body.pointer("/details/code").and_then(Value::as_str),
            Some("cannot_merge_groups")
        );
    }
}
