//! Device activation record: one device's occupancy of a license seat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Activation state of a device.
///
/// A single tagged state instead of separate `is_active`/`is_revoked`
/// flags, so "active and revoked at once" is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum DeviceState {
    /// Occupying a seat on its license.
    Active,
    /// Seat released by an administrator or re-activation elsewhere.
    Revoked {
        /// When the revocation happened.
        revoked_at: DateTime<Utc>,
        /// Operator-supplied reason, if any.
        reason: Option<String>,
    },
}

/// Descriptive metadata reported by the device at activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceMetadata {
    /// Operator-facing device name.
    pub device_name: Option<String>,

    /// Hardware manufacturer.
    pub manufacturer: Option<String>,

    /// Hardware model.
    pub model: Option<String>,

    /// Operating system version.
    pub os_version: Option<String>,

    /// Collector application version.
    pub app_version: Option<String>,

    /// Free-form hardware details.
    pub hardware_info: Option<serde_json::Value>,
}

/// One device bound to one license.
///
/// `device_id` is provided by the device, globally unique, and immutable:
/// it maps to at most one activation record for its entire existence.
/// Re-activation mutates this record rather than creating a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceActivation {
    /// Unique identifier.
    pub id: Uuid,

    /// Owning license.
    pub license_id: Uuid,

    /// Device-provided globally unique identifier.
    pub device_id: String,

    /// Descriptive metadata, overwritten on re-activation.
    pub metadata: DeviceMetadata,

    /// When the device first activated (or last re-created its binding).
    pub activated_at: DateTime<Utc>,

    /// Last successful validation, if any. Anchors the offline grace window.
    pub last_validated_at: Option<DateTime<Utc>>,

    /// Current activation state.
    pub state: DeviceState,
}

impl DeviceActivation {
    /// Create a new active binding of `device_id` to `license_id`.
    pub fn new(license_id: Uuid, device_id: impl Into<String>, metadata: DeviceMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            license_id,
            device_id: device_id.into(),
            metadata,
            activated_at: now,
            last_validated_at: None,
            state: DeviceState::Active,
        }
    }

    /// Whether this activation currently occupies a seat.
    pub fn is_active(&self) -> bool {
        matches!(self.state, DeviceState::Active)
    }

    /// Whether this activation has been revoked.
    pub fn is_revoked(&self) -> bool {
        matches!(self.state, DeviceState::Revoked { .. })
    }

    /// Release this device's seat. Idempotent; never fails.
    pub fn revoke(&mut self, now: DateTime<Utc>, reason: Option<String>) {
        self.state = DeviceState::Revoked {
            revoked_at: now,
            reason,
        };
    }

    /// Clear revocation and occupy a seat again.
    ///
    /// Callers must have verified capacity first; this is a plain state
    /// flip.
    pub fn reactivate(&mut self) {
        self.state = DeviceState::Active;
    }

    /// Record a successful validation at `now`.
    pub fn touch_validation(&mut self, now: DateTime<Utc>) {
        self.last_validated_at = Some(now);
    }
}
