//! Device HTTP handlers.
//!
//! ```text
//! GET  /api/2/devices/{user}
//! POST /api/2/devices/{user}/{device}
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Device;
use crate::domain::ports::{DeviceSummary, UpdateDeviceRequest};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_device_uid};

/// Metadata changes for a device; absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct DeviceUpdatePayload {
    #[schema(example = "Kitchen radio")]
    pub caption: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "mobile")]
    pub device_type: Option<String>,
}

/// A device as listed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceResponse {
    /// Client-chosen device id.
    pub id: String,
    pub caption: String,
    #[serde(rename = "type")]
    pub device_type: String,
    /// Number of podcasts the device is subscribed to; listings only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<usize>,
}

impl DeviceResponse {
    fn from_device(device: Device, subscriptions: Option<usize>) -> Self {
        Self {
            id: device.uid.into(),
            caption: device.caption.into(),
            device_type: device.device_type.to_string(),
            subscriptions,
        }
    }
}

impl From<DeviceSummary> for DeviceResponse {
    fn from(value: DeviceSummary) -> Self {
        Self::from_device(value.device, Some(value.subscriptions))
    }
}

/// List the user's devices with their subscription counts.
#[utoipa::path(
    get,
    path = "/api/2/devices/{user}",
    params(("user" = String, Path, description = "Owning user id")),
    responses(
        (status = 200, description = "Devices ordered by id", body = [DeviceResponse]),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "listDevices"
)]
#[get("/devices/{user}")]
pub async fn list_devices(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<Vec<DeviceResponse>>> {
    let user_id = session.require_owner(&path.into_inner())?;
    let devices = state.devices_query.list_devices(&user_id).await?;
    Ok(web::Json(
        devices.into_iter().map(DeviceResponse::from).collect(),
    ))
}

/// Create a device or update its caption and type.
#[utoipa::path(
    post,
    path = "/api/2/devices/{user}/{device}",
    params(
        ("user" = String, Path, description = "Owning user id"),
        ("device" = String, Path, description = "Device id")
    ),
    request_body = DeviceUpdatePayload,
    responses(
        (status = 200, description = "Device after the update", body = DeviceResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Unauthorised", body = ErrorSchema),
        (status = 403, description = "Forbidden", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["devices"],
    operation_id = "updateDevice"
)]
#[post("/devices/{user}/{device}")]
pub async fn update_device(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<(String, String)>,
    payload: web::Json<DeviceUpdatePayload>,
) -> ApiResult<web::Json<DeviceResponse>> {
    let (user, device) = path.into_inner();
    let user_id = session.require_owner(&user)?;
    let device = parse_device_uid(&device, FieldName::new("device"))?;
    let DeviceUpdatePayload {
        caption,
        device_type,
    } = payload.into_inner();

    let updated = state
        .devices
        .update_device(UpdateDeviceRequest {
            user_id,
            device,
            caption,
            device_type,
        })
        .await?;
    Ok(web::Json(DeviceResponse::from_device(updated, None)))
}
