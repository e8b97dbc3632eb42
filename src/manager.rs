//! High-level entitlement engine facade.
//!
//! [`EntitlementEngine`] wires the store, clock, token issuer, lifecycle
//! services, and validation engine together behind one constructor, so
//! embedding applications deal with a single handle. Every operation the
//! crate supports is reachable from here; the underlying services stay
//! public for callers that want finer-grained wiring.

use crate::capacity;
use crate::clock::{Clock, SystemClock};
use crate::code;
use crate::config::SeatwardenConfig;
use crate::lifecycle::{DeviceService, LicenseService};
use crate::model::{
    DeviceActivation, DeviceMetadata, License, LicenseStatus, Organization, Plan, ValidationLog,
};
use crate::store::EntitlementStore;
use crate::token::TokenIssuer;
use crate::validation::{ValidationEngine, ValidationRequest, ValidationResult};
use crate::SeatwardenError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Point-in-time summary of one license, for dashboards and support
/// tooling.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseInfo {
    /// License code, hyphen-grouped for display.
    pub code: String,
    /// Current lifecycle status.
    pub status: LicenseStatus,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Whether the license validates right now (Active and unexpired).
    pub is_valid: bool,
    /// Owning organization name.
    pub organization: String,
    /// Plan name.
    pub plan: String,
    /// Seat capacity from the plan; `-1` means unlimited.
    pub max_devices: i32,
    /// Currently active device count.
    pub active_devices: usize,
    /// Free seats remaining; `-1` means unlimited.
    pub available_seats: i32,
}

/// The entitlement engine: one handle over the whole crate.
pub struct EntitlementEngine {
    store: Arc<EntitlementStore>,
    clock: Arc<dyn Clock>,
    config: SeatwardenConfig,
    licenses: LicenseService,
    devices: DeviceService,
    validation: ValidationEngine,
}

impl EntitlementEngine {
    /// Build an engine from a validated configuration, using the system
    /// clock.
    pub fn new(config: SeatwardenConfig) -> Result<Self, SeatwardenError> {
        Self::build(config, Arc::new(SystemClock))
    }

    /// Build an engine with an injected clock, for deterministic tests.
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: SeatwardenConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeatwardenError> {
        Self::build(config, clock)
    }

    fn build(config: SeatwardenConfig, clock: Arc<dyn Clock>) -> Result<Self, SeatwardenError> {
        config.validate()?;
        let issuer = TokenIssuer::new(config.signing_secret(), config.token_ttl)?;
        let store = Arc::new(EntitlementStore::new());

        let licenses = LicenseService::new(store.clone(), clock.clone());
        let devices = DeviceService::new(store.clone(), clock.clone(), issuer.clone());
        let validation =
            ValidationEngine::new(store.clone(), clock.clone(), issuer, config.offline_grace);

        info!(
            token_ttl_secs = config.token_ttl.as_secs(),
            offline_grace_secs = config.offline_grace.as_secs(),
            "entitlement engine initialized"
        );

        Ok(Self {
            store,
            clock,
            config,
            licenses,
            devices,
            validation,
        })
    }

    // --- organizations & plans --------------------------------------------

    /// Register a customer organization.
    pub fn create_organization(&self, name: impl Into<String>) -> Organization {
        self.licenses.create_organization(name)
    }

    /// Delete an organization, cascading to its licenses and devices.
    pub fn delete_organization(&self, org_id: Uuid) -> Result<(), SeatwardenError> {
        self.licenses.delete_organization(org_id)
    }

    /// Register a capacity plan. Pass `-1` devices for unlimited.
    pub fn create_plan(
        &self,
        name: impl Into<String>,
        max_devices: i32,
    ) -> Result<Plan, SeatwardenError> {
        self.licenses.create_plan(name, max_devices)
    }

    /// Delete a plan; fails while licenses still reference it.
    pub fn delete_plan(&self, plan_id: Uuid) -> Result<(), SeatwardenError> {
        self.licenses.delete_plan(plan_id)
    }

    // --- license lifecycle -------------------------------------------------

    /// Create a license for an organization on a plan.
    ///
    /// `validity_days` defaults to the configured validity window. The new
    /// license starts Inactive and must be activated before devices can
    /// join it.
    pub fn create_license(
        &self,
        org_id: Uuid,
        plan_id: Uuid,
        validity_days: Option<i64>,
        notes: Option<String>,
    ) -> Result<License, SeatwardenError> {
        let days = validity_days.unwrap_or(self.config.default_validity_days);
        self.licenses.create(org_id, plan_id, days, notes)
    }

    /// Activate a license so devices can join it.
    pub fn activate_license(&self, license_id: Uuid) -> Result<License, SeatwardenError> {
        self.licenses.activate(license_id)
    }

    /// Suspend a license; its devices fail validation until reactivation.
    pub fn suspend_license(&self, license_id: Uuid) -> Result<License, SeatwardenError> {
        self.licenses.suspend(license_id)
    }

    /// Extend a license by `days`, reviving it if expired or suspended.
    pub fn renew_license(&self, license_id: Uuid, days: i64) -> Result<License, SeatwardenError> {
        self.licenses.renew(license_id, days)
    }

    /// Delete a license and everything under it.
    pub fn delete_license(&self, license_id: Uuid) -> Result<(), SeatwardenError> {
        self.licenses.delete(license_id)
    }

    /// Flip Active-but-past-expiry licenses to Expired; returns how many.
    pub fn sweep_expired(&self) -> usize {
        self.licenses.sweep_expired()
    }

    /// Active licenses expiring within the next `days` days.
    pub fn licenses_expiring_within(&self, days: i64) -> Vec<License> {
        self.licenses.expiring_within(days)
    }

    /// List licenses, optionally filtered by organization and status.
    pub fn list_licenses(
        &self,
        org_id: Option<Uuid>,
        status: Option<LicenseStatus>,
    ) -> Vec<License> {
        self.licenses.list(org_id, status)
    }

    /// Look up a license by id.
    pub fn license(&self, license_id: Uuid) -> Result<License, SeatwardenError> {
        self.licenses.get(license_id)
    }

    /// Look up a license by its code, formatted or bare.
    pub fn license_by_code(&self, code: &str) -> Result<License, SeatwardenError> {
        self.licenses.get_by_code(code)
    }

    /// Summarize a license for display: status, validity, and seat usage.
    pub fn license_info(&self, code_input: &str) -> Result<LicenseInfo, SeatwardenError> {
        let normalized = code::normalize(code_input);
        let now = self.clock.now_utc();
        self.store.read(|state| {
            let license = state
                .license_by_code(&normalized)
                .ok_or(SeatwardenError::NotFound { entity: "license" })?;
            let plan = state
                .plan(license.plan_id)
                .ok_or(SeatwardenError::NotFound { entity: "plan" })?;
            let org = state.organization(license.org_id).ok_or(
                SeatwardenError::NotFound {
                    entity: "organization",
                },
            )?;

            Ok(LicenseInfo {
                code: code::format_for_display(&license.code),
                status: license.status,
                expires_at: license.expires_at,
                is_valid: license.is_valid(now),
                organization: org.name.clone(),
                plan: plan.name.clone(),
                max_devices: plan.max_devices,
                active_devices: state.active_seat_count(license.id),
                available_seats: capacity::available_seats(state, license)?,
            })
        })
    }

    // --- device lifecycle --------------------------------------------------

    /// Activate a device against a license code; returns the activation and
    /// its entitlement token.
    pub fn activate_device(
        &self,
        license_code: &str,
        device_id: &str,
        metadata: DeviceMetadata,
    ) -> Result<(DeviceActivation, String), SeatwardenError> {
        self.devices.activate(license_code, device_id, metadata)
    }

    /// Revoke a device's seat.
    pub fn revoke_device(
        &self,
        activation_id: Uuid,
        reason: Option<String>,
    ) -> Result<DeviceActivation, SeatwardenError> {
        self.devices.revoke(activation_id, reason)
    }

    /// Restore a revoked device if its license still has a free seat.
    pub fn reactivate_device(
        &self,
        activation_id: Uuid,
    ) -> Result<DeviceActivation, SeatwardenError> {
        self.devices.reactivate(activation_id)
    }

    /// Look up an activation by id.
    pub fn device(&self, activation_id: Uuid) -> Result<DeviceActivation, SeatwardenError> {
        self.devices.get(activation_id)
    }

    /// Look up an activation by device id.
    pub fn device_by_id(&self, device_id: &str) -> Result<DeviceActivation, SeatwardenError> {
        self.devices.get_by_device(device_id)
    }

    /// List activations, optionally filtered by license and active state.
    pub fn list_devices(
        &self,
        license_id: Option<Uuid>,
        active: Option<bool>,
    ) -> Vec<DeviceActivation> {
        self.devices.list(license_id, active)
    }

    /// Audit trail for one activation, oldest first.
    pub fn validation_logs(&self, activation_id: Uuid) -> Vec<ValidationLog> {
        self.devices.validation_logs(activation_id)
    }

    // --- validation --------------------------------------------------------

    /// Decide whether a device is currently entitled.
    pub fn validate(&self, request: &ValidationRequest) -> ValidationResult {
        self.validation.validate(request)
    }
}
