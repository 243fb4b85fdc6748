//! Shared validation helpers for inbound HTTP adapters.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::{DeviceUid, Error};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidDeviceId,
    InvalidTimestamp,
    MissingSince,
}

impl ErrorCode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDeviceId => "invalid_device_id",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::MissingSince => "missing_since",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    const fn as_str(&self) -> &str {
        self.0
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }

    fn missing(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_index(self, code: ErrorCode, index: usize, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "index": index,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn invalid_device_error(field: FieldName, value: &str) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("{field} must be a valid device id"))
        .with_value(ErrorCode::InvalidDeviceId, value)
}

pub(crate) fn parse_device_uid(value: &str, field: FieldName) -> Result<DeviceUid, Error> {
    DeviceUid::new(value).map_err(|_| invalid_device_error(field, value))
}

pub(crate) fn parse_optional_device_uid(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<DeviceUid>, Error> {
    value.map(|raw| parse_device_uid(raw, field)).transpose()
}

/// Parse a list of device ids, reporting the index of the first bad entry.
pub(crate) fn parse_device_uid_list(
    values: &[String],
    field: FieldName,
) -> Result<Vec<DeviceUid>, Error> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            DeviceUid::new(value.as_str()).map_err(|_| {
                let name = field.as_str();
                ValidationError::new(name, format!("{name} must contain valid device ids"))
                    .with_index(ErrorCode::InvalidDeviceId, index, value.as_str())
            })
        })
        .collect()
}

pub(crate) fn invalid_timestamp_error(field: FieldName, value: i64) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("{field} must be a timestamp in seconds"))
        .with_value(ErrorCode::InvalidTimestamp, value.to_string())
}

/// Interpret wire seconds since the Unix epoch.
pub(crate) fn parse_epoch_seconds(value: i64, field: FieldName) -> Result<DateTime<Utc>, Error> {
    if value < 0 {
        return Err(invalid_timestamp_error(field, value));
    }
    DateTime::from_timestamp(value, 0).ok_or_else(|| invalid_timestamp_error(field, value))
}

/// Parse the mandatory `since` watermark of a delta read.
pub(crate) fn parse_since(value: Option<i64>, field: FieldName) -> Result<DateTime<Utc>, Error> {
    let Some(raw) = value else {
        let name = field.as_str();
        return Err(ValidationError::new(name, format!("parameter '{name}' missing"))
            .missing(ErrorCode::MissingSince));
    };
    parse_epoch_seconds(raw, field)
}

pub(crate) fn parse_optional_epoch_seconds(
    value: Option<i64>,
    field: FieldName,
) -> Result<Option<DateTime<Utc>>, Error> {
    value
        .map(|raw| parse_epoch_seconds(raw, field))
        .transpose()
}
