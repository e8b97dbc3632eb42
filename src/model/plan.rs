//! Capacity/pricing tier record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel `max_devices` value meaning unlimited seats.
pub const UNLIMITED_DEVICES: i32 = -1;

/// A capacity tier a license is sold under.
///
/// Plan names are unique. A plan cannot be deleted while any license
/// references it; the entitlement store blocks the delete instead of
/// cascading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier.
    pub id: Uuid,

    /// Unique plan name (e.g. "Starter", "Pro").
    pub name: String,

    /// Maximum concurrently active devices, or [`UNLIMITED_DEVICES`].
    pub max_devices: i32,

    /// Monthly price per device seat.
    pub price_per_device: Option<f64>,

    /// Human-readable description.
    pub description: Option<String>,

    /// Whether the plan is available for new licenses.
    pub is_active: bool,

    /// Whether this is a bespoke enterprise plan.
    pub is_enterprise: bool,
}

impl Plan {
    /// Create a new active plan with the given seat capacity.
    pub fn new(name: impl Into<String>, max_devices: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            max_devices,
            price_per_device: None,
            description: None,
            is_active: true,
            is_enterprise: max_devices == UNLIMITED_DEVICES,
        }
    }

    /// Whether this plan places no limit on active devices.
    pub fn is_unlimited(&self) -> bool {
        self.max_devices == UNLIMITED_DEVICES
    }
}
