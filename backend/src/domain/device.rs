//! Client devices and their grouping membership.
//!
//! A device is created lazily the first time a client addresses it by its
//! user-scoped `uid`. Each device sits in at most one sync group.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Maximum length of a client-chosen device uid.
pub const DEVICE_UID_MAX: usize = 64;

/// Caption given to devices created implicitly by an API call.
pub const DEFAULT_DEVICE_CAPTION: &str = "New Device";

static DEVICE_UID_RE: OnceLock<Regex> = OnceLock::new();

fn device_uid_regex() -> &'static Regex {
    DEVICE_UID_RE.get_or_init(|| {
        Regex::new(r"^[\w.-]+$")
            .unwrap_or_else(|error| panic!("device uid regex failed to compile: {error}"))
    })
}

/// Validation failures for device fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceValidationError {
    /// The uid was empty.
    #[error("device uid must not be empty")]
    EmptyUid,
    /// The uid exceeded [`DEVICE_UID_MAX`] characters.
    #[error("device uid must be at most {max} characters")]
    UidTooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The uid contained characters outside `[A-Za-z0-9_.-]`.
    #[error("device uid may only contain letters, digits, '_', '.' or '-'")]
    InvalidUidCharacters,
    /// The caption was blank.
    #[error("device caption must not be empty")]
    EmptyCaption,
    /// The device type is not one of the known kinds.
    #[error("invalid device type {0}")]
    UnknownType(String),
}

/// Surrogate key of a stored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap a UUID read from storage.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// User-scoped device identifier chosen by the client.
///
/// # Examples
/// ```
/// use podsync::domain::DeviceUid;
///
/// assert!(DeviceUid::new("phone-1").is_ok());
/// assert!(DeviceUid::new("bad uid").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceUid(String);

impl DeviceUid {
    /// Validate and construct a uid.
    pub fn new(uid: impl Into<String>) -> Result<Self, DeviceValidationError> {
        let uid = uid.into();
        if uid.is_empty() {
            return Err(DeviceValidationError::EmptyUid);
        }
        if uid.chars().count() > DEVICE_UID_MAX {
            return Err(DeviceValidationError::UidTooLong {
                max: DEVICE_UID_MAX,
            });
        }
        if !device_uid_regex().is_match(&uid) {
            return Err(DeviceValidationError::InvalidUidCharacters);
        }
        Ok(Self(uid))
    }

    /// Borrow the uid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for DeviceUid {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceUid {
    type Error = DeviceValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceUid> for String {
    fn from(value: DeviceUid) -> Self {
        value.0
    }
}

/// Kind of client hardware a device represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Desktop computer.
    Desktop,
    /// Laptop computer.
    Laptop,
    /// Phone or other handheld.
    Mobile,
    /// Headless server.
    Server,
    /// Tablet.
    Tablet,
    /// Anything else.
    #[default]
    Other,
}

impl DeviceType {
    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Laptop => "laptop",
            Self::Mobile => "mobile",
            Self::Server => "server",
            Self::Tablet => "tablet",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = DeviceValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(Self::Desktop),
            "laptop" => Ok(Self::Laptop),
            "mobile" => Ok(Self::Mobile),
            "server" => Ok(Self::Server),
            "tablet" => Ok(Self::Tablet),
            "other" => Ok(Self::Other),
            other => Err(DeviceValidationError::UnknownType(other.to_owned())),
        }
    }
}

/// Human readable device name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceCaption(String);

impl DeviceCaption {
    /// Validate and construct a caption.
    pub fn new(caption: impl Into<String>) -> Result<Self, DeviceValidationError> {
        let caption = caption.into();
        if caption.trim().is_empty() {
            return Err(DeviceValidationError::EmptyCaption);
        }
        Ok(Self(caption))
    }

    /// Borrow the caption text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for DeviceCaption {
    fn default() -> Self {
        Self(DEFAULT_DEVICE_CAPTION.to_owned())
    }
}

impl TryFrom<String> for DeviceCaption {
    type Error = DeviceValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceCaption> for String {
    fn from(value: DeviceCaption) -> Self {
        value.0
    }
}

/// Identifier of a sync group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncGroupId(Uuid);

impl SyncGroupId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap a UUID read from storage.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SyncGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A client device owned by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Storage identifier.
    pub id: DeviceId,
    /// Owning user.
    pub user_id: UserId,
    /// Client-chosen identifier, unique per user.
    pub uid: DeviceUid,
    /// Display name.
    pub caption: DeviceCaption,
    /// Hardware kind.
    pub device_type: DeviceType,
    /// Group membership, `None` while ungrouped.
    pub sync_group: Option<SyncGroupId>,
}

impl Device {
    /// Build a freshly created, ungrouped device with default metadata.
    #[must_use]
    pub fn new_default(user_id: UserId, uid: DeviceUid) -> Self {
        Self {
            id: DeviceId::random(),
            user_id,
            uid,
            caption: DeviceCaption::default(),
            device_type: DeviceType::default(),
            sync_group: None,
        }
    }

    /// Whether the device currently belongs to a sync group.
    #[must_use]
    pub const fn is_grouped(&self) -> bool {
        self.sync_group.is_some()
    }
}
